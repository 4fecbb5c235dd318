//! Process-wide handle to the navigation graph.

use nav_core::NavGraph;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Single-writer / many-reader graph shared by ingestion, route searches and
/// the in-use registry.
#[derive(Debug, Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<NavGraph>>,
}

impl SharedGraph {
    pub fn new(graph: NavGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    /// Consistent read view. Searches hold it for their whole run.
    pub fn read(&self) -> RwLockReadGuard<'_, NavGraph> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, NavGraph> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl From<NavGraph> for SharedGraph {
    fn from(graph: NavGraph) -> Self {
        Self::new(graph)
    }
}
