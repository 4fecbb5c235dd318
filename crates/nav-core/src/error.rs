//! Error types for graph mutation and route search.

use crate::graph::{EdgeId, NodeId};
use thiserror::Error;

/// Contract violations on the graph. These point at broken bookkeeping in
/// the caller and are never swallowed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("invalid handle {0}")]
    InvalidHandle(String),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {node} still has {edges} incident edge(s)")]
    NodeInUse { node: NodeId, edges: usize },

    #[error("edge cost must be finite and non-negative, got {0}")]
    InvalidCost(f64),

    #[error("airway segment references waypoint #{0} outside the loaded list")]
    SegmentOutOfRange(usize),

    #[error("edge {0} is not held by any route")]
    NotAcquired(EdgeId),
}

impl GraphError {
    pub fn invalid_node(node: NodeId) -> Self {
        GraphError::InvalidHandle(format!("node {node}"))
    }

    pub fn invalid_edge(edge: EdgeId) -> Self {
        GraphError::InvalidHandle(format!("edge {edge}"))
    }
}

/// Route search outcomes other than a path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("no path found from {from} to {to}")]
    NoPathFound { from: String, to: String },
}
