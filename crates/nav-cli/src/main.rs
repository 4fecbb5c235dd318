//! navplan - route planning over permanent airways and live oceanic tracks

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use nav_cli::config::parse_families;
use nav_cli::{load_airways, log_report, run_refresh_loop, Config, DirectoryTrackProvider};
use nav_core::{NavGraph, NodeId, RouteSearch, SearchOptions, TrackFamily};
use nav_tracks::{SharedGraph, StatusKind, TrackIngestionEngine};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Plan routes over airways and published oceanic tracks
#[derive(Parser, Debug)]
#[command(name = "navplan", author, version, about)]
struct Cli {
    /// Airway data file (overrides NAVPLAN_AIRWAYS_PATH)
    #[arg(long, global = true)]
    airways: Option<PathBuf>,

    /// Track bulletin directory (overrides NAVPLAN_TRACKS_DIR)
    #[arg(long, global = true)]
    tracks_dir: Option<PathBuf>,

    /// Comma separated track families (overrides NAVPLAN_FAMILIES)
    #[arg(long, global = true)]
    families: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh tracks once and print the best route
    Route {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Departure procedure fixes flown after the origin
        #[arg(long, value_delimiter = ',')]
        sid: Vec<String>,

        /// Arrival procedure fixes flown before the destination
        #[arg(long, value_delimiter = ',')]
        star: Vec<String>,

        /// Instant the route must be valid at (RFC 3339, default now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Print the route as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep track families refreshed until interrupted
    Watch {
        /// Refresh interval in seconds (overrides NAVPLAN_REFRESH_SECS)
        #[arg(long)]
        refresh_secs: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
struct RouteOutput {
    route: String,
    waypoints: Vec<String>,
    airways: Vec<String>,
    total_nm: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navplan=info,nav_cli=info,nav_tracks=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.airways {
        config.airways_path = path;
    }
    if let Some(dir) = cli.tracks_dir {
        config.tracks_dir = dir;
    }
    if let Some(list) = cli.families {
        let families = parse_families(&list);
        if families.is_empty() {
            bail!("no known track family in '{}'", list);
        }
        config.families = families;
    }

    match cli.command {
        Command::Route {
            from,
            to,
            sid,
            star,
            at,
            json,
        } => {
            let at = at.unwrap_or_else(Utc::now);
            route(config, &from, &to, &sid, &star, at, json).await
        }
        Command::Watch { refresh_secs } => {
            if let Some(secs) = refresh_secs.filter(|secs| *secs > 0) {
                config.refresh_secs = secs;
            }
            watch(config).await
        }
    }
}

async fn build_engine(config: &Config) -> Result<Arc<TrackIngestionEngine<DirectoryTrackProvider>>> {
    let graph = load_airways(&config.airways_path).await?;
    let provider = DirectoryTrackProvider::new(&config.tracks_dir);
    Ok(Arc::new(TrackIngestionEngine::new(provider, SharedGraph::new(graph))))
}

async fn route(
    config: Config,
    from: &str,
    to: &str,
    sid: &[String],
    star: &[String],
    at: DateTime<Utc>,
    json: bool,
) -> Result<()> {
    let engine = build_engine(&config).await?;

    for family in &config.families {
        match engine.refresh(*family).await {
            Ok(report) => {
                log_report(&report);
                tracing::info!(
                    "{}: {} track(s) active, {} failed",
                    family,
                    report.added() + report.count(StatusKind::Unchanged),
                    report.failed()
                );
            }
            Err(err) => tracing::warn!("{} tracks unavailable: {}", family, err),
        }
    }

    let graph = engine.graph().read();
    let options = SearchOptions {
        prefix: resolve_chain(&graph, sid).context("resolving --sid")?,
        suffix: resolve_chain(&graph, star).context("resolving --star")?,
        valid_at: Some(at),
        ..SearchOptions::default()
    };
    let path = RouteSearch::new(&graph).find_by_codes(from, to, &options)?;

    if json {
        let output = RouteOutput {
            route: path.describe(&graph),
            waypoints: path.codes(&graph),
            airways: path
                .legs
                .iter()
                .map(|leg| leg.airway.clone().unwrap_or_else(|| "DCT".to_string()))
                .collect(),
            total_nm: path.total_cost,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", path.describe(&graph));
        println!("{:.1} NM", path.total_cost);
    }
    Ok(())
}

/// Procedure fixes by code, each disambiguated against the previous fix.
fn resolve_chain(graph: &NavGraph, codes: &[String]) -> Result<Vec<NodeId>> {
    let mut chain: Vec<NodeId> = Vec::with_capacity(codes.len());
    for code in codes {
        let found = match chain.last() {
            Some(prev) => {
                let wpt = graph.node(*prev)?;
                graph.nearest_by_code(code, wpt.lat, wpt.lon)
            }
            None => graph.find_by_code(code),
        };
        match found {
            Some(node) => chain.push(node),
            None => bail!("unknown waypoint {}", code),
        }
    }
    Ok(chain)
}

async fn watch(config: Config) -> Result<()> {
    let engine = build_engine(&config).await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let mut handles = Vec::with_capacity(config.families.len());
    for family in config.families.iter().copied() {
        handles.push(tokio::spawn(run_refresh_loop(
            engine.clone(),
            family,
            config.clone(),
            shutdown_tx.subscribe(),
        )));
    }
    tracing::info!(
        "Watching {} from {}",
        config
            .families
            .iter()
            .map(|f: &TrackFamily| f.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        config.tracks_dir.display()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(());
    for handle in handles {
        if let Err(err) = handle.await {
            tracing::warn!("Refresh loop ended abnormally: {}", err);
        }
    }
    Ok(())
}
