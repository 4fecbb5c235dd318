//! Per-refresh outcome records handed to the caller.

use chrono::{DateTime, Utc};
use nav_core::TrackFamily;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Track edges were inserted.
    Added,
    /// Installed edges already match the bulletin.
    Unchanged,
    /// Track left the bulletin and its edges were deleted.
    Removed,
    /// Record could not be parsed.
    ParseFailed,
    /// A route waypoint could not be resolved to a node.
    WaypointNotFound,
    /// Superseded edges are held by live routes and were only marked.
    SkippedInUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub family: TrackFamily,
    pub ident: Option<String>,
    pub kind: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusRecord {
    pub fn new(family: TrackFamily, ident: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            family,
            ident: Some(ident.into()),
            kind,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Everything one `refresh` did for a family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub family: TrackFamily,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<StatusRecord>,
}

impl RefreshReport {
    pub fn new(family: TrackFamily) -> Self {
        Self {
            family,
            finished_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn count(&self, kind: StatusKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn added(&self) -> usize {
        self.count(StatusKind::Added)
    }

    pub fn failed(&self) -> usize {
        self.count(StatusKind::ParseFailed) + self.count(StatusKind::WaypointNotFound)
    }

    pub fn skipped(&self) -> usize {
        self.count(StatusKind::SkippedInUse)
    }

    pub fn all_unchanged(&self) -> bool {
        self.records.iter().all(|r| r.kind == StatusKind::Unchanged)
    }

    pub fn for_ident<'a>(&'a self, ident: &'a str) -> impl Iterator<Item = &'a StatusRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.ident.as_deref() == Some(ident))
    }
}
