//! navplan: airway route planning with live oceanic tracks.
//!
//! - `config`: environment configuration
//! - `airways`: static airway data loader
//! - `provider`: directory-backed track bulletins
//! - `refresh_loop`: periodic per-family refresh
//! - `schedule`: refresh and retry timing

pub mod airways;
pub mod config;
pub mod provider;
pub mod refresh_loop;
pub mod schedule;

pub use airways::{load_airways, parse_airways, AirwayData};
pub use config::Config;
pub use provider::DirectoryTrackProvider;
pub use refresh_loop::{log_report, run_refresh_loop};
pub use schedule::RefreshSchedule;
