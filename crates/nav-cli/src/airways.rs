//! Static airway data file.
//!
//! ```json
//! {
//!   "waypoints": [{ "code": "KJFK", "lat": 40.64, "lon": -73.78 }, ...],
//!   "airways": [{ "from": 0, "to": 1, "airway": "J80" }, ...]
//! }
//! ```
//!
//! Airway endpoints index into `waypoints`. A missing `cost` defaults to the
//! great-circle distance.

use anyhow::{Context, Result};
use nav_core::{AirwaySegment, NavGraph, Waypoint};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirwayData {
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub airways: Vec<AirwaySegment>,
}

impl AirwayData {
    pub fn into_graph(self) -> Result<NavGraph> {
        let mut graph = NavGraph::with_capacity(self.waypoints.len(), self.airways.len());
        graph.load_permanent(self.waypoints, self.airways)?;
        Ok(graph)
    }
}

pub fn parse_airways(text: &str) -> Result<NavGraph> {
    let data: AirwayData = serde_json::from_str(text).context("invalid airway data")?;
    data.into_graph()
}

pub async fn load_airways(path: &Path) -> Result<NavGraph> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading airway data {}", path.display()))?;
    let graph = parse_airways(&text).with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(
        "Loaded {} waypoints and {} airway segments from {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_graph_with_default_costs() {
        let graph = parse_airways(
            r#"{
                "waypoints": [
                    {"code": "AAA", "lat": 0.0, "lon": 0.0},
                    {"code": "BBB", "lat": 1.0, "lon": 0.0}
                ],
                "airways": [
                    {"from": 0, "to": 1, "airway": "J1"},
                    {"from": 1, "to": 0, "airway": "J1", "cost": 75.0}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(graph.node_count(), 2);
        let mut costs: Vec<f64> = graph.edges().map(|(_, e)| e.cost).collect();
        costs.sort_by(|a, b| a.total_cmp(b));
        assert!((costs[0] - 60.0).abs() < 0.1);
        assert_eq!(costs[1], 75.0);
    }

    #[test]
    fn rejects_out_of_range_segment() {
        let err = parse_airways(
            r#"{"waypoints": [{"code": "AAA", "lat": 0.0, "lon": 0.0}],
                "airways": [{"from": 0, "to": 3, "airway": "J1"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains('3'), "{err}");
    }
}
