//! Live track ingestion.
//!
//! A refresh runs fetch, parse, diff and apply for one family. Families
//! refresh independently; refreshes of the same family are serialized. Each
//! track identifier is applied under a single graph write lock so readers
//! never see half a track.

use crate::in_use::InUseRegistry;
use crate::parser::coords::parse_coordinate;
use crate::parser::{parse_bulletin, ParseFailure, TrackRecord};
use crate::provider::{TrackProvider, TransportError};
use crate::shared::SharedGraph;
use crate::status::{RefreshReport, StatusKind, StatusRecord};
use nav_core::{EdgeId, EdgeKind, GraphError, NavGraph, NodeId, TrackFamily, TrackTag, Waypoint};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("graph update failed: {0}")]
    Graph(#[from] GraphError),
}

/// Where a family's refresh currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Fetching,
    Parsing,
    Diffing,
    Applying,
    Failed,
}

#[derive(Debug)]
struct FamilySlot {
    refresh_lock: tokio::sync::Mutex<()>,
    phase: Mutex<RefreshPhase>,
    last_error: Mutex<Option<String>>,
}

impl FamilySlot {
    fn new() -> Self {
        Self {
            refresh_lock: tokio::sync::Mutex::new(()),
            phase: Mutex::new(RefreshPhase::Idle),
            last_error: Mutex::new(None),
        }
    }

    fn set_phase(&self, phase: RefreshPhase) {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner()) = phase;
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = error;
    }
}

/// Puts the family back to `Idle` however the refresh ends, including when
/// the refresh future is dropped mid-flight. A failed refresh stays
/// `Failed` until the next one starts.
struct PhaseGuard<'a> {
    slot: &'a FamilySlot,
    failed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn enter(slot: &'a FamilySlot, phase: RefreshPhase) -> Self {
        slot.set_phase(phase);
        Self {
            slot,
            failed: false,
        }
    }

    fn advance(&self, phase: RefreshPhase) {
        self.slot.set_phase(phase);
    }

    fn fail(mut self, error: &impl std::fmt::Display) {
        self.failed = true;
        self.slot.set_phase(RefreshPhase::Failed);
        self.slot.set_last_error(Some(error.to_string()));
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.failed {
            self.slot.set_phase(RefreshPhase::Idle);
        }
    }
}

/// Non-pending edges currently installed for one identifier.
#[derive(Debug, Default)]
struct Installed {
    fingerprint: u64,
    edges: Vec<EdgeId>,
}

#[derive(Debug, Default)]
struct RefreshPlan {
    unchanged: Vec<String>,
    /// Identifiers whose installed edges must go, with the replacing record
    /// when the identifier is still published.
    changed: Vec<(String, Vec<EdgeId>, Option<TrackRecord>)>,
    fresh: Vec<TrackRecord>,
}

enum Resolved {
    Existing(NodeId),
    Created(Waypoint),
}

pub struct TrackIngestionEngine<P> {
    provider: P,
    graph: SharedGraph,
    in_use: Arc<InUseRegistry>,
    families: HashMap<TrackFamily, FamilySlot>,
}

impl<P: TrackProvider> TrackIngestionEngine<P> {
    pub fn new(provider: P, graph: SharedGraph) -> Self {
        let in_use = Arc::new(InUseRegistry::new(graph.clone()));
        Self::with_registry(provider, graph, in_use)
    }

    pub fn with_registry(provider: P, graph: SharedGraph, in_use: Arc<InUseRegistry>) -> Self {
        let families = TrackFamily::ALL
            .iter()
            .map(|family| (*family, FamilySlot::new()))
            .collect();
        Self {
            provider,
            graph,
            in_use,
            families,
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn in_use(&self) -> &Arc<InUseRegistry> {
        &self.in_use
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn phase(&self, family: TrackFamily) -> RefreshPhase {
        *self.slot(family).phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Error from the most recent failed refresh, cleared by a successful one.
    pub fn last_error(&self, family: TrackFamily) -> Option<String> {
        self.slot(family)
            .last_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Fetch, parse and apply the latest bulletin for `family`.
    ///
    /// A transport failure leaves the graph untouched. Dropping the returned
    /// future between stages abandons the refresh without partial tracks.
    pub async fn refresh(&self, family: TrackFamily) -> Result<RefreshReport, IngestError> {
        let slot = self.slot(family);
        let _serial = slot.refresh_lock.lock().await;
        let phase = PhaseGuard::enter(slot, RefreshPhase::Fetching);

        tracing::debug!("Fetching {} bulletin", family);
        let text = match self.provider.fetch(family).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("{}", err);
                phase.fail(&err);
                return Err(err.into());
            }
        };
        tokio::task::yield_now().await;

        phase.advance(RefreshPhase::Parsing);
        let bulletin = parse_bulletin(family, &text);
        for failure in &bulletin.failures {
            tracing::warn!(
                "{} record {} dropped: {} ({})",
                family,
                failure.ident.as_deref().unwrap_or("?"),
                failure.reason,
                failure.excerpt
            );
        }
        tokio::task::yield_now().await;

        phase.advance(RefreshPhase::Diffing);
        let plan = self.plan(family, bulletin.records);
        tokio::task::yield_now().await;

        phase.advance(RefreshPhase::Applying);
        let mut report = RefreshReport::new(family);
        report.records.extend(bulletin.failures.iter().map(failure_status));
        if let Err(err) = self.apply(family, plan, &mut report) {
            tracing::error!("{} refresh aborted: {}", family, err);
            phase.fail(&err);
            return Err(err.into());
        }

        slot.set_last_error(None);
        report.finished_at = chrono::Utc::now();
        tracing::info!(
            "{} refresh: {} added, {} unchanged, {} removed, {} failed, {} held",
            family,
            report.added(),
            report.count(StatusKind::Unchanged),
            report.count(StatusKind::Removed),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    /// Refresh every family concurrently.
    pub async fn refresh_all(&self) -> Vec<(TrackFamily, Result<RefreshReport, IngestError>)> {
        let (nats, pacots, ausots) = tokio::join!(
            self.refresh(TrackFamily::Nats),
            self.refresh(TrackFamily::Pacots),
            self.refresh(TrackFamily::Ausots),
        );
        vec![
            (TrackFamily::Nats, nats),
            (TrackFamily::Pacots, pacots),
            (TrackFamily::Ausots, ausots),
        ]
    }

    /// Withdraw every installed track of `family`. Edges held by routes are
    /// only marked pending removal.
    pub async fn clear_family(&self, family: TrackFamily) -> RefreshReport {
        let slot = self.slot(family);
        let _serial = slot.refresh_lock.lock().await;
        let _phase = PhaseGuard::enter(slot, RefreshPhase::Applying);

        let installed = self.installed(family);
        let mut report = RefreshReport::new(family);
        for (ident, current) in installed {
            let mut graph = self.graph.write();
            let held = self.retire(&mut graph, &current.edges);
            report.records.push(retire_status(family, &ident, held, current.edges.len(), true));
        }
        tracing::info!("Cleared {} {} track(s)", report.records.len(), family);
        report
    }

    fn slot(&self, family: TrackFamily) -> &FamilySlot {
        // Populated for every family in the constructor.
        &self.families[&family]
    }

    fn installed(&self, family: TrackFamily) -> BTreeMap<String, Installed> {
        let graph = self.graph.read();
        let mut installed: BTreeMap<String, Installed> = BTreeMap::new();
        for (id, edge, tag) in graph.track_edges(family) {
            if edge.pending_removal {
                continue;
            }
            let entry = installed.entry(tag.ident.clone()).or_default();
            entry.fingerprint = tag.fingerprint;
            entry.edges.push(id);
        }
        installed
    }

    fn plan(&self, family: TrackFamily, records: Vec<TrackRecord>) -> RefreshPlan {
        let mut installed = self.installed(family);
        let mut plan = RefreshPlan::default();

        for record in records {
            match installed.remove(&record.ident) {
                Some(current) if current.fingerprint == record.fingerprint() => {
                    plan.unchanged.push(record.ident);
                }
                Some(current) => {
                    plan.changed.push((record.ident.clone(), current.edges, Some(record)));
                }
                None => plan.fresh.push(record),
            }
        }
        for (ident, current) in installed {
            plan.changed.push((ident, current.edges, None));
        }
        plan
    }

    fn apply(
        &self,
        family: TrackFamily,
        plan: RefreshPlan,
        report: &mut RefreshReport,
    ) -> Result<(), GraphError> {
        for ident in plan.unchanged {
            report.records.push(StatusRecord::new(family, ident, StatusKind::Unchanged));
        }

        for (ident, edges, replacement) in plan.changed {
            let mut graph = self.graph.write();
            let held = self.retire(&mut graph, &edges);
            if held > 0 || replacement.is_none() {
                report
                    .records
                    .push(retire_status(family, &ident, held, edges.len(), replacement.is_none()));
            }
            if let Some(record) = replacement {
                report.records.push(install(&mut graph, &record)?);
            }
        }

        for record in plan.fresh {
            let mut graph = self.graph.write();
            report.records.push(install(&mut graph, &record)?);
        }
        Ok(())
    }

    /// Delete idle edges and mark held ones. Returns how many were held.
    fn retire(&self, graph: &mut NavGraph, edges: &[EdgeId]) -> usize {
        let mut held = 0;
        for edge in edges {
            if self.in_use.is_in_use(*edge) {
                if graph.mark_pending_removal(*edge).is_ok() {
                    held += 1;
                }
            } else {
                graph.remove_edge(*edge);
            }
        }
        held
    }
}

fn failure_status(failure: &ParseFailure) -> StatusRecord {
    StatusRecord {
        family: failure.family,
        ident: failure.ident.clone(),
        kind: StatusKind::ParseFailed,
        message: Some(format!("{}: {}", failure.reason, failure.excerpt)),
    }
}

fn retire_status(
    family: TrackFamily,
    ident: &str,
    held: usize,
    total: usize,
    withdrawn: bool,
) -> StatusRecord {
    if held > 0 {
        StatusRecord::new(family, ident, StatusKind::SkippedInUse).with_message(format!(
            "{held} of {total} edge(s) held by active routes, marked for removal"
        ))
    } else {
        let kind = if withdrawn {
            StatusKind::Removed
        } else {
            StatusKind::Unchanged
        };
        StatusRecord::new(family, ident, kind)
    }
}

/// Insert one edge per hop of `record`. Waypoints are resolved before any
/// mutation so an unknown code leaves the graph as it was.
fn install(graph: &mut NavGraph, record: &TrackRecord) -> Result<StatusRecord, GraphError> {
    let resolved = match resolve_route(graph, &record.route) {
        Ok(resolved) => resolved,
        Err(code) => {
            tracing::warn!("{} track {}: waypoint {} not found", record.family, record.ident, code);
            return Ok(
                StatusRecord::new(record.family, &record.ident, StatusKind::WaypointNotFound)
                    .with_message(format!("waypoint {code} not found")),
            );
        }
    };

    let nodes: Vec<NodeId> = resolved
        .into_iter()
        .map(|step| match step {
            Resolved::Existing(node) => node,
            Resolved::Created(waypoint) => graph.add_node(waypoint),
        })
        .collect();

    let tag = TrackTag {
        family: record.family,
        ident: record.ident.clone(),
        window: record.window.clone(),
        fingerprint: record.fingerprint(),
    };
    let airway = record.airway();
    let mut inserted = Vec::with_capacity(nodes.len());
    for hop in nodes.windows(2) {
        let (from, to) = (hop[0], hop[1]);
        if from == to {
            continue;
        }
        let added = match graph.distance_nm(from, to) {
            Ok(cost) => graph.add_edge(from, to, airway.as_str(), cost, EdgeKind::Track(tag.clone())),
            Err(err) => Err(err),
        };
        match added {
            Ok(edge) => inserted.push(edge),
            Err(err) => {
                for edge in inserted {
                    graph.remove_edge(edge);
                }
                return Err(err);
            }
        }
    }

    tracing::debug!("Installed {} with {} segment(s)", airway, inserted.len());
    Ok(StatusRecord::new(record.family, &record.ident, StatusKind::Added)
        .with_message(format!("{} segment(s)", inserted.len())))
}

/// Map route codes to nodes. The first code takes the first node with that
/// code; later codes take the candidate nearest the previous waypoint.
/// Unknown coordinate codes become new nodes. Returns the first code that
/// cannot be resolved.
fn resolve_route(graph: &NavGraph, route: &[String]) -> Result<Vec<Resolved>, String> {
    let mut resolved = Vec::with_capacity(route.len());
    let mut previous: Option<(f64, f64)> = None;

    for code in route {
        let found = match previous {
            Some((lat, lon)) => graph.nearest_by_code(code, lat, lon),
            None => graph.find_by_code(code),
        };
        let step = match found {
            Some(node) => {
                let wpt = graph.node(node).map_err(|_| code.clone())?;
                previous = Some((wpt.lat, wpt.lon));
                Resolved::Existing(node)
            }
            None => {
                let (lat, lon) = parse_coordinate(code).ok_or_else(|| code.clone())?;
                previous = Some((lat, lon));
                Resolved::Created(Waypoint::new(code.as_str(), lat, lon))
            }
        };
        resolved.push(step);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(codes: &[(&str, f64, f64)]) -> NavGraph {
        let mut graph = NavGraph::new();
        for (code, lat, lon) in codes {
            graph.add_node(Waypoint::new(*code, *lat, *lon));
        }
        graph
    }

    #[test]
    fn resolve_prefers_candidate_near_previous_waypoint() {
        let mut graph = graph_with(&[("ALPHA", 0.0, 0.0), ("DUP", 50.0, 50.0)]);
        let near = graph.add_node(Waypoint::new("DUP", 0.5, 0.5));
        let route = vec!["ALPHA".to_string(), "DUP".to_string()];

        let resolved = resolve_route(&graph, &route).unwrap();
        assert!(matches!(resolved[1], Resolved::Existing(node) if node == near));
    }

    #[test]
    fn resolve_creates_coordinate_nodes() {
        let graph = graph_with(&[("ALPHA", 0.0, 0.0)]);
        let route = vec!["ALPHA".to_string(), "10S150E".to_string()];
        let resolved = resolve_route(&graph, &route).unwrap();
        match &resolved[1] {
            Resolved::Created(wpt) => {
                assert_eq!(wpt.code, "10S150E");
                assert_eq!(wpt.lat, -10.0);
                assert_eq!(wpt.lon, 150.0);
            }
            Resolved::Existing(_) => panic!("expected a new node"),
        }
    }

    #[test]
    fn install_without_known_waypoint_leaves_graph_alone() {
        let mut graph = graph_with(&[("ALPHA", 0.0, 0.0)]);
        let record = TrackRecord {
            family: TrackFamily::Pacots,
            ident: "3".to_string(),
            route: vec!["ALPHA".to_string(), "10S150E".to_string(), "NOWHR".to_string()],
            window: Default::default(),
        };

        let status = install(&mut graph, &record).unwrap();
        assert_eq!(status.kind, StatusKind::WaypointNotFound);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn install_adds_one_edge_per_hop() {
        let mut graph = graph_with(&[("ALPHA", 0.0, 0.0), ("BRAVO", 1.0, 0.0), ("CHARL", 2.0, 0.0)]);
        let record = TrackRecord {
            family: TrackFamily::Nats,
            ident: "A".to_string(),
            route: vec!["ALPHA".to_string(), "BRAVO".to_string(), "CHARL".to_string()],
            window: Default::default(),
        };

        let status = install(&mut graph, &record).unwrap();
        assert_eq!(status.kind, StatusKind::Added);
        assert_eq!(graph.edge_count(), 2);
        for (_, edge, tag) in graph.track_edges(TrackFamily::Nats) {
            assert_eq!(edge.airway, "NATA");
            assert_eq!(tag.fingerprint, record.fingerprint());
            assert!((edge.cost - 60.0).abs() < 0.1);
        }
    }
}
