//! End-to-end refresh behaviour against an in-memory provider.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nav_core::{
    EdgeKind, NavGraph, RouteSearch, SearchError, SearchOptions, TrackFamily, Waypoint,
};
use nav_tracks::{
    IngestError, RefreshPhase, SharedGraph, StaticTrackProvider, StatusKind, TrackIngestionEngine,
    TrackProvider, TransportError,
};
use tokio::sync::Notify;

const NAT_DAY_ONE: &str = "\
NAT TRACKS FLS 310/390 INCLUSIVE
11061130UTC TO 11061900UTC
A MALOT 62/20 63/30 PRAWN
EAST LVLS NIL
B LIMRI 52/20 53/30 DORYY
EAST LVLS NIL
";

const NAT_DAY_TWO: &str = "\
NAT TRACKS FLS 310/390 INCLUSIVE
11071130UTC TO 11071900UTC
B LIMRI 52/20 53/30 DORYY
EAST LVLS NIL
";

const PACOTS: &str = "\
TRACK 1.
FLEX ROUTE : KALNA 31N150E 33N160E ONEMO
11061200UTC - 11062200UTC
RTS/RJAA OTR11 KALNA
TRACK 3.
SEALS 1200UTC 1206001200UTC
";

fn base_graph() -> NavGraph {
    let mut graph = NavGraph::new();
    for (code, lat, lon) in [
        ("MALOT", 53.0, -15.0),
        ("PRAWN", 64.0, -40.0),
        ("LIMRI", 52.0, -15.0),
        ("DORYY", 53.0, -40.0),
        ("KALNA", 30.0, 145.0),
        ("ONEMO", 35.0, 165.0),
    ] {
        graph.add_node(Waypoint::new(code, lat, lon));
    }
    graph
}

fn engine() -> TrackIngestionEngine<StaticTrackProvider> {
    TrackIngestionEngine::new(StaticTrackProvider::new(), SharedGraph::new(base_graph()))
}

#[tokio::test]
async fn second_refresh_with_same_bulletin_changes_nothing() {
    let engine = engine();
    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);

    let first = engine.refresh(TrackFamily::Nats).await.unwrap();
    assert_eq!(first.added(), 2);
    let edges = engine.graph().read().edge_count();
    let nodes = engine.graph().read().node_count();
    assert_eq!(edges, 6);

    let second = engine.refresh(TrackFamily::Nats).await.unwrap();
    assert!(second.all_unchanged(), "{:?}", second.records);
    assert_eq!(second.records.len(), 2);
    assert_eq!(engine.graph().read().edge_count(), edges);
    assert_eq!(engine.graph().read().node_count(), nodes);
    assert_eq!(engine.phase(TrackFamily::Nats), RefreshPhase::Idle);
}

#[tokio::test]
async fn withdrawn_track_is_removed() {
    let engine = engine();
    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);
    engine.refresh(TrackFamily::Nats).await.unwrap();

    engine.provider().set(TrackFamily::Nats, NAT_DAY_TWO);
    let report = engine.refresh(TrackFamily::Nats).await.unwrap();

    let a: Vec<_> = report.for_ident("A").map(|r| r.kind).collect();
    assert_eq!(a, vec![StatusKind::Removed]);
    // B changed validity window, so it is reinstalled.
    let b: Vec<_> = report.for_ident("B").map(|r| r.kind).collect();
    assert_eq!(b, vec![StatusKind::Added]);

    let graph = engine.graph().read();
    assert!(graph.edges().all(|(_, edge)| edge.airway == "NATB"));
    assert_eq!(graph.edge_count(), 3);
}

#[tokio::test]
async fn held_edge_survives_until_released() {
    let engine = engine();
    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);
    engine.refresh(TrackFamily::Nats).await.unwrap();

    let route = {
        let graph = engine.graph().read();
        RouteSearch::new(&graph)
            .find_by_codes("MALOT", "PRAWN", &SearchOptions::default())
            .unwrap()
    };
    let held = engine.in_use().acquire_route(&route).unwrap();
    assert_eq!(held.len(), 3);

    engine.provider().set(TrackFamily::Nats, NAT_DAY_TWO);
    let report = engine.refresh(TrackFamily::Nats).await.unwrap();
    let a: Vec<_> = report.for_ident("A").map(|r| r.kind).collect();
    assert_eq!(a, vec![StatusKind::SkippedInUse]);

    {
        let graph = engine.graph().read();
        let malot = graph.find_by_code("MALOT").unwrap();
        let outgoing = graph.edges_from(malot).unwrap();
        assert!(outgoing.contains(&held[0]));
        assert!(graph.edge(held[0]).unwrap().pending_removal);

        let err = RouteSearch::new(&graph)
            .find_by_codes("MALOT", "PRAWN", &SearchOptions::default())
            .unwrap_err();
        assert!(matches!(err, nav_core::SearchError::NoPathFound { .. }));
    }

    engine.in_use().release_route(&held).unwrap();
    let graph = engine.graph().read();
    for edge in &held {
        assert!(!graph.contains_edge(*edge));
    }
    assert!(graph.edges().all(|(_, edge)| edge.airway == "NATB"));
}

#[tokio::test]
async fn malformed_record_reports_failure_and_keeps_others() {
    let engine = engine();
    engine.provider().set(TrackFamily::Pacots, PACOTS);

    let report = engine.refresh(TrackFamily::Pacots).await.unwrap();
    assert_eq!(report.added(), 1);
    let three: Vec<_> = report.for_ident("3").map(|r| r.kind).collect();
    assert_eq!(three, vec![StatusKind::ParseFailed]);

    let graph = engine.graph().read();
    assert_eq!(graph.track_edges(TrackFamily::Pacots).count(), 3);
    assert!(graph.find_by_code("31N150E").is_some());
    assert!(graph.find_by_code("SEALS").is_none());
}

#[tokio::test]
async fn transport_failure_leaves_graph_untouched() {
    let engine = engine();
    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);
    engine.refresh(TrackFamily::Nats).await.unwrap();
    let before = engine.graph().read().edge_count();

    engine.provider().unset(TrackFamily::Nats);
    let err = engine.refresh(TrackFamily::Nats).await.unwrap_err();
    assert!(matches!(err, IngestError::Transport(_)));
    assert_eq!(engine.graph().read().edge_count(), before);
    assert!(engine.last_error(TrackFamily::Nats).is_some());
    assert_eq!(engine.phase(TrackFamily::Nats), RefreshPhase::Failed);

    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);
    engine.refresh(TrackFamily::Nats).await.unwrap();
    assert!(engine.last_error(TrackFamily::Nats).is_none());
    assert_eq!(engine.phase(TrackFamily::Nats), RefreshPhase::Idle);
}

#[tokio::test]
async fn families_refresh_independently() {
    let engine = engine();
    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);
    engine.provider().set(TrackFamily::Pacots, PACOTS);

    let results = engine.refresh_all().await;
    assert_eq!(results.len(), 3);
    for (family, result) in &results {
        match family {
            TrackFamily::Ausots => assert!(result.is_err()),
            _ => assert!(result.is_ok(), "{family}: {result:?}"),
        }
    }

    let graph = engine.graph().read();
    assert_eq!(graph.track_edges(TrackFamily::Nats).count(), 6);
    assert_eq!(graph.track_edges(TrackFamily::Pacots).count(), 3);
    assert_eq!(graph.track_edges(TrackFamily::Ausots).count(), 0);
}

#[tokio::test]
async fn clear_family_leaves_permanent_airways() {
    let mut graph = base_graph();
    let malot = graph.find_by_code("MALOT").unwrap();
    let limri = graph.find_by_code("LIMRI").unwrap();
    graph.add_edge(malot, limri, "UN546", 60.0, EdgeKind::Permanent).unwrap();
    let engine = TrackIngestionEngine::new(StaticTrackProvider::new(), SharedGraph::new(graph));
    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);
    engine.refresh(TrackFamily::Nats).await.unwrap();

    let report = engine.clear_family(TrackFamily::Nats).await;
    assert_eq!(report.count(StatusKind::Removed), 2);

    let graph = engine.graph().read();
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.edges().next().map(|(_, e)| e.airway.clone()), Some("UN546".to_string()));
}

#[tokio::test]
async fn dropped_refresh_future_resets_phase() {
    let engine = engine();
    engine.provider().set(TrackFamily::Nats, NAT_DAY_ONE);
    {
        let refresh = engine.refresh(TrackFamily::Nats);
        let mut refresh = Box::pin(refresh);
        // One poll runs up to the first yield point, then the future is dropped.
        let _ = poll_once(refresh.as_mut()).await;
    }
    assert_eq!(engine.phase(TrackFamily::Nats), RefreshPhase::Idle);
    assert_eq!(engine.graph().read().edge_count(), 0);
}

async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        out = fut => Some(out),
        _ = std::future::ready(()) => None,
    }
}

/// Serves one bulletin, but each fetch waits for the gate to open.
struct GatedProvider {
    text: String,
    gate: Notify,
    fetches: AtomicUsize,
}

impl GatedProvider {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            gate: Notify::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn open_once(&self) {
        self.gate.notify_one();
    }
}

impl TrackProvider for GatedProvider {
    async fn fetch(&self, _family: TrackFamily) -> Result<String, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(self.text.clone())
    }
}

async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..400 {
        if ready() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_family_refreshes_run_one_at_a_time() {
    let engine = Arc::new(TrackIngestionEngine::new(
        GatedProvider::new(NAT_DAY_ONE),
        SharedGraph::new(base_graph()),
    ));

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh(TrackFamily::Nats).await }
    });
    wait_until(|| engine.provider().fetches() == 1).await;
    assert_eq!(engine.phase(TrackFamily::Nats), RefreshPhase::Fetching);

    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh(TrackFamily::Nats).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    // The second refresh waits on the family lock, not in the provider.
    assert_eq!(engine.provider().fetches(), 1);
    assert_eq!(engine.graph().read().edge_count(), 0);

    engine.provider().open_once();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.added(), 2);

    wait_until(|| engine.provider().fetches() == 2).await;
    engine.provider().open_once();
    let second = second.await.unwrap().unwrap();
    assert!(second.all_unchanged(), "{:?}", second.records);

    assert_eq!(engine.graph().read().edge_count(), 6);
    assert_eq!(engine.phase(TrackFamily::Nats), RefreshPhase::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn searches_during_refresh_see_whole_tracks() {
    let engine = engine();
    let stop = Arc::new(AtomicBool::new(false));

    let searcher = tokio::task::spawn_blocking({
        let graph = engine.graph().clone();
        let stop = stop.clone();
        move || {
            let mut searches = 0usize;
            while !stop.load(Ordering::SeqCst) {
                let graph = graph.read();
                let nat_a = graph.edges().filter(|(_, edge)| edge.airway == "NATA").count();
                assert!(nat_a == 0 || nat_a == 3, "track A half installed: {nat_a} edges");

                match RouteSearch::new(&graph).find_by_codes("MALOT", "PRAWN", &SearchOptions::default()) {
                    Ok(route) => {
                        assert_eq!(nat_a, 3);
                        for edge in route.edges() {
                            assert!(graph.edge(edge).is_ok(), "route uses a missing edge");
                        }
                    }
                    Err(SearchError::NoPathFound { .. }) => assert_eq!(nat_a, 0),
                    Err(err) => panic!("unexpected search error: {err}"),
                }
                searches += 1;
            }
            searches
        }
    });

    for round in 0..20 {
        let bulletin = if round % 2 == 0 { NAT_DAY_ONE } else { NAT_DAY_TWO };
        engine.provider().set(TrackFamily::Nats, bulletin);
        engine.refresh(TrackFamily::Nats).await.unwrap();
        tokio::task::yield_now().await;
    }
    stop.store(true, Ordering::SeqCst);

    let searches = searcher.await.unwrap();
    assert!(searches > 0);
    let graph = engine.graph().read();
    assert_eq!(graph.edges().filter(|(_, edge)| edge.airway == "NATA").count(), 0);
    assert_eq!(graph.edges().filter(|(_, edge)| edge.airway == "NATB").count(), 3);
}
