//! Source of raw bulletin text.
//!
//! Transport details (HTTP, files, timeouts) belong to the implementor; the
//! engine only sees text or a [`TransportError`].

use nav_core::TrackFamily;
use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetching {family} bulletin failed: {message}")]
pub struct TransportError {
    pub family: TrackFamily,
    pub message: String,
}

impl TransportError {
    pub fn new(family: TrackFamily, message: impl Into<String>) -> Self {
        Self {
            family,
            message: message.into(),
        }
    }
}

pub trait TrackProvider: Send + Sync {
    fn fetch(
        &self,
        family: TrackFamily,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// In-memory provider whose bulletins can be swapped between refreshes.
#[derive(Debug, Default)]
pub struct StaticTrackProvider {
    bulletins: RwLock<HashMap<TrackFamily, String>>,
}

impl StaticTrackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, family: TrackFamily, text: impl Into<String>) {
        let mut bulletins = self
            .bulletins
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        bulletins.insert(family, text.into());
    }

    pub fn unset(&self, family: TrackFamily) {
        let mut bulletins = self
            .bulletins
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        bulletins.remove(&family);
    }
}

impl TrackProvider for StaticTrackProvider {
    async fn fetch(&self, family: TrackFamily) -> Result<String, TransportError> {
        let bulletins = self
            .bulletins
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        bulletins
            .get(&family)
            .cloned()
            .ok_or_else(|| TransportError::new(family, "no bulletin available"))
    }
}
