//! navplan configuration from environment.

use nav_core::TrackFamily;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file with waypoints and permanent airways.
    pub airways_path: PathBuf,
    /// Directory holding one `<family>.txt` bulletin per track family.
    pub tracks_dir: PathBuf,
    pub refresh_secs: u64,
    pub backoff_max_secs: u64,
    pub families: Vec<TrackFamily>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            airways_path: lookup("NAVPLAN_AIRWAYS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/airways.json")),
            tracks_dir: lookup("NAVPLAN_TRACKS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/tracks")),
            refresh_secs: lookup("NAVPLAN_REFRESH_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(900),
            backoff_max_secs: lookup("NAVPLAN_BACKOFF_MAX_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            families: lookup("NAVPLAN_FAMILIES")
                .map(|list| parse_families(&list))
                .filter(|families| !families.is_empty())
                .unwrap_or_else(|| TrackFamily::ALL.to_vec()),
        }
    }
}

/// Comma separated family names; unknown names are skipped with a warning.
pub fn parse_families(list: &str) -> Vec<TrackFamily> {
    let mut families = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match TrackFamily::parse(name) {
            Some(family) if !families.contains(&family) => families.push(family),
            Some(_) => {}
            None => tracing::warn!("Ignoring unknown track family '{}'", name),
        }
    }
    families
}
