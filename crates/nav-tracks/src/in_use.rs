//! Reference counts for track edges held by live routes.
//!
//! Ingestion never deletes an edge with a non-zero count; it marks it
//! pending removal instead, and the last `release` deletes it.

use crate::shared::SharedGraph;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use nav_core::{EdgeId, GraphError, NavGraph, RoutePath};

#[derive(Debug)]
pub struct InUseRegistry {
    graph: SharedGraph,
    counts: DashMap<EdgeId, usize>,
}

impl InUseRegistry {
    pub fn new(graph: SharedGraph) -> Self {
        Self {
            graph,
            counts: DashMap::new(),
        }
    }

    /// Register one more route depending on `edge`. Returns the new count.
    pub fn acquire(&self, edge: EdgeId) -> Result<usize, GraphError> {
        let graph = self.graph.read();
        self.increment(&graph, edge)
    }

    /// Drop one route's hold on `edge`. Returns the remaining count; at zero
    /// an edge marked pending removal is deleted.
    pub fn release(&self, edge: EdgeId) -> Result<usize, GraphError> {
        let remaining = match self.counts.entry(edge) {
            Entry::Occupied(mut held) => {
                *held.get_mut() -= 1;
                let remaining = *held.get();
                if remaining == 0 {
                    held.remove();
                }
                remaining
            }
            Entry::Vacant(_) => return Err(GraphError::NotAcquired(edge)),
        };

        if remaining == 0 {
            self.purge_if_pending(edge);
        }
        Ok(remaining)
    }

    /// Acquire every track edge of a route under a single graph read.
    /// Returns the edges that were acquired.
    pub fn acquire_route(&self, route: &RoutePath) -> Result<Vec<EdgeId>, GraphError> {
        let graph = self.graph.read();
        let edges = route.track_edges(&graph);
        if let Some(missing) = edges.iter().find(|edge| !graph.contains_edge(**edge)) {
            return Err(GraphError::invalid_edge(*missing));
        }
        for edge in &edges {
            self.increment(&graph, *edge)?;
        }
        Ok(edges)
    }

    pub fn release_route(&self, edges: &[EdgeId]) -> Result<(), GraphError> {
        for edge in edges {
            self.release(*edge)?;
        }
        Ok(())
    }

    pub fn count(&self, edge: EdgeId) -> usize {
        self.counts.get(&edge).map(|held| *held).unwrap_or(0)
    }

    pub fn is_in_use(&self, edge: EdgeId) -> bool {
        self.count(edge) > 0
    }

    pub fn held_edges(&self) -> Vec<(EdgeId, usize)> {
        let mut held: Vec<(EdgeId, usize)> = self
            .counts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        held.sort();
        held
    }

    fn increment(&self, graph: &NavGraph, edge: EdgeId) -> Result<usize, GraphError> {
        if !graph.contains_edge(edge) {
            return Err(GraphError::invalid_edge(edge));
        }
        let mut held = self.counts.entry(edge).or_insert(0);
        *held += 1;
        Ok(*held)
    }

    fn purge_if_pending(&self, edge: EdgeId) {
        let mut graph = self.graph.write();
        let pending = graph
            .edge(edge)
            .map(|e| e.pending_removal)
            .unwrap_or(false);
        if pending && !self.is_in_use(edge) {
            if let Some(removed) = graph.remove_edge(edge) {
                tracing::debug!("Deleted released track edge {} ({})", edge, removed.airway);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_core::{EdgeKind, NavGraph, Waypoint};

    fn setup() -> (InUseRegistry, SharedGraph, EdgeId) {
        let mut graph = NavGraph::new();
        let a = graph.add_node(Waypoint::new("A", 0.0, 0.0));
        let b = graph.add_node(Waypoint::new("B", 1.0, 0.0));
        let edge = graph.add_edge(a, b, "NATA", 60.0, EdgeKind::Permanent).unwrap();
        let shared = SharedGraph::new(graph);
        (InUseRegistry::new(shared.clone()), shared, edge)
    }

    #[test]
    fn counts_go_up_and_down() {
        let (registry, _, edge) = setup();
        assert_eq!(registry.acquire(edge), Ok(1));
        assert_eq!(registry.acquire(edge), Ok(2));
        assert_eq!(registry.release(edge), Ok(1));
        assert!(registry.is_in_use(edge));
        assert_eq!(registry.release(edge), Ok(0));
        assert!(!registry.is_in_use(edge));
        assert_eq!(registry.release(edge), Err(GraphError::NotAcquired(edge)));
    }

    #[test]
    fn last_release_deletes_pending_edge() {
        let (registry, shared, edge) = setup();
        registry.acquire(edge).unwrap();
        shared.write().mark_pending_removal(edge).unwrap();

        registry.release(edge).unwrap();
        assert!(!shared.read().contains_edge(edge));
        assert!(matches!(registry.acquire(edge), Err(GraphError::InvalidHandle(_))));
    }

    #[test]
    fn release_keeps_active_edge() {
        let (registry, shared, edge) = setup();
        registry.acquire(edge).unwrap();
        registry.release(edge).unwrap();
        assert!(shared.read().contains_edge(edge));
        assert!(registry.held_edges().is_empty());
    }
}
