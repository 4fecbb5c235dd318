//! Directed waypoint graph.
//!
//! Waypoints are nodes, airway and track segments are edges. Both live in a
//! [`StableIndexStore`] so that handles held by routes and in-use records stay
//! valid while tracks are swapped in and out around them.

use crate::error::GraphError;
use crate::models::{AirwaySegment, EdgeKind, TrackFamily, TrackTag, Waypoint};
use crate::spatial::distance_nm;
use crate::store::{Handle, StableIndexStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(Handle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(Handle);

impl NodeId {
    pub fn handle(self) -> Handle {
        self.0
    }
}

impl EdgeId {
    pub fn handle(self) -> Handle {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A directed, costed segment between two waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Airway or track airway name, e.g. `H164` or `NATA`.
    pub airway: String,
    pub cost: f64,
    pub kind: EdgeKind,
    /// Superseded track still held by a live route. New searches skip it.
    pub pending_removal: bool,
}

impl Edge {
    pub fn track(&self) -> Option<&TrackTag> {
        self.kind.track()
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    waypoint: Waypoint,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

#[derive(Debug, Clone, Default)]
pub struct NavGraph {
    nodes: StableIndexStore<NodeEntry>,
    edges: StableIndexStore<Edge>,
    by_code: HashMap<String, Vec<NodeId>>,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: StableIndexStore::with_capacity(nodes),
            edges: StableIndexStore::with_capacity(edges),
            by_code: HashMap::with_capacity(nodes),
        }
    }

    // ==== Nodes ====

    pub fn add_node(&mut self, waypoint: Waypoint) -> NodeId {
        let code = waypoint.code.clone();
        let id = NodeId(self.nodes.insert(NodeEntry {
            waypoint,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }));
        self.by_code.entry(code).or_default().push(id);
        id
    }

    /// Remove a node that no longer has any incident edges.
    pub fn remove_node(&mut self, node: NodeId) -> Result<Waypoint, GraphError> {
        let entry = self
            .nodes
            .get(node.0)
            .ok_or_else(|| GraphError::invalid_node(node))?;
        let incident = entry.outgoing.len() + entry.incoming.len();
        if incident > 0 {
            return Err(GraphError::NodeInUse {
                node,
                edges: incident,
            });
        }

        let entry = self
            .nodes
            .remove(node.0)
            .ok_or_else(|| GraphError::invalid_node(node))?;
        if let Some(ids) = self.by_code.get_mut(&entry.waypoint.code) {
            ids.retain(|id| *id != node);
            if ids.is_empty() {
                self.by_code.remove(&entry.waypoint.code);
            }
        }
        Ok(entry.waypoint)
    }

    pub fn node(&self, node: NodeId) -> Result<&Waypoint, GraphError> {
        self.nodes
            .get(node.0)
            .map(|entry| &entry.waypoint)
            .ok_or_else(|| GraphError::invalid_node(node))
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(node.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Waypoint)> + '_ {
        self.nodes
            .iter()
            .map(|(handle, entry)| (NodeId(handle), &entry.waypoint))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First inserted node carrying `code`.
    pub fn find_by_code(&self, code: &str) -> Option<NodeId> {
        self.by_code.get(code).and_then(|ids| ids.first().copied())
    }

    /// Every node carrying `code`, in insertion order.
    pub fn find_all_by_code(&self, code: &str) -> &[NodeId] {
        self.by_code.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node carrying `code` closest to the given position.
    pub fn nearest_by_code(&self, code: &str, lat: f64, lon: f64) -> Option<NodeId> {
        let reference = Waypoint::new(code, lat, lon);
        self.find_all_by_code(code)
            .iter()
            .filter_map(|id| self.node(*id).ok().map(|wpt| (*id, distance_nm(&reference, wpt))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    // ==== Edges ====

    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        airway: impl Into<String>,
        cost: f64,
        kind: EdgeKind,
    ) -> Result<EdgeId, GraphError> {
        if !self.nodes.contains(from.0) {
            return Err(GraphError::UnknownNode(from));
        }
        if !self.nodes.contains(to.0) {
            return Err(GraphError::UnknownNode(to));
        }
        if !cost.is_finite() || cost < 0.0 {
            return Err(GraphError::InvalidCost(cost));
        }

        let id = EdgeId(self.edges.insert(Edge {
            from,
            to,
            airway: airway.into(),
            cost,
            kind,
            pending_removal: false,
        }));
        if let Some(entry) = self.nodes.get_mut(from.0) {
            entry.outgoing.push(id);
        }
        if let Some(entry) = self.nodes.get_mut(to.0) {
            entry.incoming.push(id);
        }
        Ok(id)
    }

    /// Remove an edge and unlink it from both endpoints. Removing an already
    /// removed edge returns `None`.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Option<Edge> {
        let removed = self.edges.remove(edge.0)?;
        if let Some(entry) = self.nodes.get_mut(removed.from.0) {
            entry.outgoing.retain(|id| *id != edge);
        }
        if let Some(entry) = self.nodes.get_mut(removed.to.0) {
            entry.incoming.retain(|id| *id != edge);
        }
        Some(removed)
    }

    pub fn edge(&self, edge: EdgeId) -> Result<&Edge, GraphError> {
        self.edges
            .get(edge.0)
            .ok_or_else(|| GraphError::invalid_edge(edge))
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains(edge.0)
    }

    pub fn mark_pending_removal(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        let entry = self
            .edges
            .get_mut(edge.0)
            .ok_or_else(|| GraphError::invalid_edge(edge))?;
        entry.pending_removal = true;
        Ok(())
    }

    pub fn edges_from(&self, node: NodeId) -> Result<&[EdgeId], GraphError> {
        self.nodes
            .get(node.0)
            .map(|entry| entry.outgoing.as_slice())
            .ok_or_else(|| GraphError::invalid_node(node))
    }

    pub fn edges_to(&self, node: NodeId) -> Result<&[EdgeId], GraphError> {
        self.nodes
            .get(node.0)
            .map(|entry| entry.incoming.as_slice())
            .ok_or_else(|| GraphError::invalid_node(node))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter().map(|(handle, edge)| (EdgeId(handle), edge))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Installed track edges of one family, including pending removals.
    pub fn track_edges(
        &self,
        family: TrackFamily,
    ) -> impl Iterator<Item = (EdgeId, &Edge, &TrackTag)> + '_ {
        self.edges().filter_map(move |(id, edge)| {
            edge.track()
                .filter(|tag| tag.family == family)
                .map(|tag| (id, edge, tag))
        })
    }

    /// Great-circle distance between two nodes in nautical miles.
    pub fn distance_nm(&self, a: NodeId, b: NodeId) -> Result<f64, GraphError> {
        Ok(distance_nm(self.node(a)?, self.node(b)?))
    }

    // ==== Bulk load ====

    /// Load the static airway structure. Returns the node handle of every
    /// supplied waypoint, in input order.
    pub fn load_permanent(
        &mut self,
        waypoints: Vec<Waypoint>,
        airways: Vec<AirwaySegment>,
    ) -> Result<Vec<NodeId>, GraphError> {
        if let Some(bad) = airways
            .iter()
            .flat_map(|seg| [seg.from, seg.to])
            .find(|idx| *idx >= waypoints.len())
        {
            return Err(GraphError::SegmentOutOfRange(bad));
        }
        if let Some(bad) = airways
            .iter()
            .filter_map(|seg| seg.cost)
            .find(|cost| !cost.is_finite() || *cost < 0.0)
        {
            return Err(GraphError::InvalidCost(bad));
        }

        let ids: Vec<NodeId> = waypoints.into_iter().map(|wpt| self.add_node(wpt)).collect();
        for segment in airways {
            let from = ids[segment.from];
            let to = ids[segment.to];
            let cost = match segment.cost {
                Some(cost) => cost,
                None => self.distance_nm(from, to)?,
            };
            self.add_edge(from, to, segment.airway, cost, EdgeKind::Permanent)?;
        }
        Ok(ids)
    }
}
