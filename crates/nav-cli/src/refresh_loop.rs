//! Periodic per-family track refresh.

use std::sync::Arc;

use nav_core::TrackFamily;
use nav_tracks::{IngestError, RefreshReport, StatusKind, TrackIngestionEngine, TrackProvider};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::schedule::RefreshSchedule;

/// Refresh `family` every `config.refresh_secs` until shutdown, starting
/// at once. Failed fetches are retried on a backoff capped at
/// `config.backoff_max_secs`.
pub async fn run_refresh_loop<P>(
    engine: Arc<TrackIngestionEngine<P>>,
    family: TrackFamily,
    config: Config,
    mut shutdown: broadcast::Receiver<()>,
) where
    P: TrackProvider + 'static,
{
    let mut schedule = RefreshSchedule::from_config(&config);

    tracing::info!("{} refresh loop started ({}s interval)", family, config.refresh_secs);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("{} refresh loop shutting down", family);
                break;
            }
            _ = schedule.wait() => {
                match engine.refresh(family).await {
                    Ok(report) => {
                        schedule.completed();
                        log_report(&report);
                    }
                    Err(IngestError::Transport(err)) => {
                        let delay = schedule.failed();
                        tracing::warn!(
                            "{} (attempt {}, retrying in {:?})",
                            err,
                            schedule.failures(),
                            delay
                        );
                    }
                    Err(err) => {
                        let delay = schedule.failed();
                        tracing::error!("{} refresh failed: {} (retrying in {:?})", family, err, delay);
                    }
                }
            }
        }
    }
}

pub fn log_report(report: &RefreshReport) {
    for record in &report.records {
        let ident = record.ident.as_deref().unwrap_or("?");
        let message = record.message.as_deref().unwrap_or("");
        match record.kind {
            StatusKind::ParseFailed | StatusKind::WaypointNotFound => {
                tracing::warn!("{} {}: {:?} {}", report.family, ident, record.kind, message)
            }
            StatusKind::SkippedInUse => {
                tracing::info!("{} {}: held by active routes, {}", report.family, ident, message)
            }
            _ => tracing::debug!("{} {}: {:?} {}", report.family, ident, record.kind, message),
        }
    }
}
