//! Least-cost route search over the navigation graph.
//!
//! Uniform-cost search over non-negative edge costs. Equal-cost alternatives
//! are settled in favor of the lexicographically smaller chain of waypoint
//! codes so the same graph always produces the same route.

use crate::error::SearchError;
use crate::graph::{EdgeId, NavGraph, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

const COST_EPSILON: f64 = 1e-9;

/// Constraints applied to a single search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Departure procedure waypoints flown verbatim right after the origin.
    pub prefix: Vec<NodeId>,
    /// Arrival procedure waypoints flown verbatim right before the destination.
    pub suffix: Vec<NodeId>,
    pub excluded_edges: HashSet<EdgeId>,
    /// Interior waypoints the free search must not pass through.
    pub avoided_nodes: HashSet<NodeId>,
    /// Allow superseded tracks still held by live routes.
    pub allow_pending_removal: bool,
    /// Skip track edges whose validity window does not contain this instant.
    pub valid_at: Option<DateTime<Utc>>,
}

/// One leg of a computed route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: NodeId,
    pub to: NodeId,
    /// `None` for legs stitched in from a procedure chain.
    pub edge: Option<EdgeId>,
    pub airway: Option<String>,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    pub nodes: Vec<NodeId>,
    pub legs: Vec<RouteLeg>,
    pub total_cost: f64,
}

impl RoutePath {
    /// Graph edges traversed by the route, in order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.legs.iter().filter_map(|leg| leg.edge)
    }

    /// Traversed edges that belong to a published track.
    pub fn track_edges(&self, graph: &NavGraph) -> Vec<EdgeId> {
        self.edges()
            .filter(|id| {
                graph
                    .edge(*id)
                    .map(|edge| edge.kind.is_track())
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn codes(&self, graph: &NavGraph) -> Vec<String> {
        self.nodes
            .iter()
            .map(|id| {
                graph
                    .node(*id)
                    .map(|wpt| wpt.code.clone())
                    .unwrap_or_else(|_| id.to_string())
            })
            .collect()
    }

    /// Compact textual route: `KJFK DCT A ALB J1 B ...`.
    pub fn describe(&self, graph: &NavGraph) -> String {
        let codes = self.codes(graph);
        let mut parts = Vec::with_capacity(codes.len() * 2);
        if let Some(first) = codes.first() {
            parts.push(first.clone());
        }
        for (leg, code) in self.legs.iter().zip(codes.iter().skip(1)) {
            parts.push(leg.airway.clone().unwrap_or_else(|| "DCT".to_string()));
            parts.push(code.clone());
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    cost: FloatOrd,
    node: NodeId,
}

/// Read-only search bound to one consistent view of the graph.
pub struct RouteSearch<'g> {
    graph: &'g NavGraph,
}

impl<'g> RouteSearch<'g> {
    pub fn new(graph: &'g NavGraph) -> Self {
        Self { graph }
    }

    /// Resolve both endpoints by code (first match) and search.
    pub fn find_by_codes(
        &self,
        origin: &str,
        destination: &str,
        options: &SearchOptions,
    ) -> Result<RoutePath, SearchError> {
        let from = self
            .graph
            .find_by_code(origin)
            .ok_or_else(|| SearchError::UnknownNode(origin.to_string()))?;
        let to = self
            .graph
            .find_by_code(destination)
            .ok_or_else(|| SearchError::UnknownNode(destination.to_string()))?;
        self.find(from, to, options)
    }

    pub fn find(
        &self,
        origin: NodeId,
        destination: NodeId,
        options: &SearchOptions,
    ) -> Result<RoutePath, SearchError> {
        for node in [origin, destination]
            .iter()
            .chain(options.prefix.iter())
            .chain(options.suffix.iter())
        {
            if !self.graph.contains_node(*node) {
                return Err(SearchError::UnknownNode(node.to_string()));
            }
        }

        let mut head = vec![origin];
        push_chain(&mut head, &options.prefix);
        let mut tail: Vec<NodeId> = Vec::with_capacity(options.suffix.len() + 1);
        push_chain(&mut tail, &options.suffix);
        push_chain(&mut tail, &[destination]);

        let mut legs = self.stitch(&head)?;
        let free_start = *head.last().unwrap_or(&origin);
        let free_goal = *tail.first().unwrap_or(&destination);
        legs.extend(self.search(free_start, free_goal, options)?);
        legs.extend(self.stitch(&tail)?);

        let mut nodes = vec![origin];
        nodes.extend(legs.iter().map(|leg| leg.to));
        let total_cost = legs.iter().map(|leg| leg.cost).sum();
        Ok(RoutePath {
            nodes,
            legs,
            total_cost,
        })
    }

    /// Direct legs between consecutive chain waypoints, costed by geometry.
    fn stitch(&self, chain: &[NodeId]) -> Result<Vec<RouteLeg>, SearchError> {
        chain
            .windows(2)
            .map(|pair| {
                let cost = self
                    .graph
                    .distance_nm(pair[0], pair[1])
                    .map_err(|_| SearchError::UnknownNode(pair[0].to_string()))?;
                Ok(RouteLeg {
                    from: pair[0],
                    to: pair[1],
                    edge: None,
                    airway: None,
                    cost,
                })
            })
            .collect()
    }

    fn search(
        &self,
        start: NodeId,
        goal: NodeId,
        options: &SearchOptions,
    ) -> Result<Vec<RouteLeg>, SearchError> {
        if start == goal {
            return Ok(Vec::new());
        }

        let mut best: HashMap<NodeId, f64> = HashMap::new();
        let mut prev: HashMap<NodeId, (NodeId, EdgeId)> = HashMap::new();
        let mut closed: HashSet<NodeId> = HashSet::new();
        let mut open = BinaryHeap::new();

        best.insert(start, 0.0);
        open.push(Reverse(OpenNode {
            cost: FloatOrd(0.0),
            node: start,
        }));

        while let Some(Reverse(current)) = open.pop() {
            let node = current.node;
            if !closed.insert(node) {
                continue;
            }
            if node == goal {
                return Ok(self.reconstruct(start, goal, &prev));
            }

            let Ok(outgoing) = self.graph.edges_from(node) else {
                continue;
            };
            for edge_id in outgoing {
                let Ok(edge) = self.graph.edge(*edge_id) else {
                    continue;
                };
                if !self.edge_usable(*edge_id, options) {
                    continue;
                }
                let next = edge.to;
                if closed.contains(&next) {
                    continue;
                }
                if next != goal && options.avoided_nodes.contains(&next) {
                    continue;
                }

                let candidate = current.cost.0 + edge.cost;
                let replace = match best.get(&next) {
                    None => true,
                    Some(existing) if candidate < existing - tolerance(*existing) => true,
                    Some(existing) if (candidate - existing).abs() <= tolerance(*existing) => {
                        self.prefer_chain(start, node, &prev, next)
                    }
                    Some(_) => false,
                };
                if !replace {
                    continue;
                }

                let improved = best.get(&next).map_or(true, |existing| candidate < *existing);
                if improved {
                    best.insert(next, candidate);
                    open.push(Reverse(OpenNode {
                        cost: FloatOrd(candidate),
                        node: next,
                    }));
                }
                prev.insert(next, (node, *edge_id));
            }
        }

        Err(SearchError::NoPathFound {
            from: self.code_of(start),
            to: self.code_of(goal),
        })
    }

    fn edge_usable(&self, edge_id: EdgeId, options: &SearchOptions) -> bool {
        let Ok(edge) = self.graph.edge(edge_id) else {
            return false;
        };
        if options.excluded_edges.contains(&edge_id) {
            return false;
        }
        if edge.pending_removal && !options.allow_pending_removal {
            return false;
        }
        match (edge.track(), options.valid_at) {
            (Some(tag), Some(at)) => tag.window.contains(at),
            _ => true,
        }
    }

    /// On an equal-cost relaxation of `next`, decide whether reaching it via
    /// `via` beats its current predecessor chain.
    fn prefer_chain(
        &self,
        start: NodeId,
        via: NodeId,
        prev: &HashMap<NodeId, (NodeId, EdgeId)>,
        next: NodeId,
    ) -> bool {
        let Some((current_via, _)) = prev.get(&next) else {
            return false;
        };
        if *current_via == via {
            return false;
        }
        let candidate = self.chain_to(start, via, prev);
        let existing = self.chain_to(start, *current_via, prev);
        self.compare_chains(&candidate, &existing) == Ordering::Less
    }

    fn chain_to(
        &self,
        start: NodeId,
        end: NodeId,
        prev: &HashMap<NodeId, (NodeId, EdgeId)>,
    ) -> Vec<NodeId> {
        let mut chain = vec![end];
        let mut cursor = end;
        while cursor != start {
            match prev.get(&cursor) {
                Some((before, _)) => {
                    cursor = *before;
                    chain.push(cursor);
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    fn compare_chains(&self, a: &[NodeId], b: &[NodeId]) -> Ordering {
        let codes_a: Vec<&str> = a.iter().map(|id| self.code_ref(*id)).collect();
        let codes_b: Vec<&str> = b.iter().map(|id| self.code_ref(*id)).collect();
        codes_a.cmp(&codes_b).then_with(|| a.cmp(b))
    }

    fn reconstruct(
        &self,
        start: NodeId,
        goal: NodeId,
        prev: &HashMap<NodeId, (NodeId, EdgeId)>,
    ) -> Vec<RouteLeg> {
        let mut legs = Vec::new();
        let mut cursor = goal;
        while cursor != start {
            let Some((before, edge_id)) = prev.get(&cursor) else {
                break;
            };
            let (airway, cost) = self
                .graph
                .edge(*edge_id)
                .map(|edge| (Some(edge.airway.clone()), edge.cost))
                .unwrap_or((None, 0.0));
            legs.push(RouteLeg {
                from: *before,
                to: cursor,
                edge: Some(*edge_id),
                airway,
                cost,
            });
            cursor = *before;
        }
        legs.reverse();
        legs
    }

    fn code_ref(&self, node: NodeId) -> &'g str {
        self.graph
            .node(node)
            .map(|wpt| wpt.code.as_str())
            .unwrap_or("")
    }

    fn code_of(&self, node: NodeId) -> String {
        match self.graph.node(node) {
            Ok(wpt) => wpt.code.clone(),
            Err(_) => node.to_string(),
        }
    }
}

fn tolerance(reference: f64) -> f64 {
    COST_EPSILON * reference.abs().max(1.0)
}

/// Append `chain` to `route`, skipping a leading waypoint equal to the
/// current end of the route.
fn push_chain(route: &mut Vec<NodeId>, chain: &[NodeId]) {
    for node in chain {
        if route.last() != Some(node) {
            route.push(*node);
        }
    }
}
