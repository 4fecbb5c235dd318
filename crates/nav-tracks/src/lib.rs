//! Oceanic track bulletins: parsing, live ingestion into the shared
//! navigation graph, and reference counting of edges held by routes.

pub mod in_use;
pub mod ingest;
pub mod parser;
pub mod provider;
pub mod shared;
pub mod status;

pub use in_use::InUseRegistry;
pub use ingest::{IngestError, RefreshPhase, TrackIngestionEngine};
pub use parser::{parse_bulletin, parser_for, ParseFailure, ParsedBulletin, TrackParser, TrackRecord};
pub use provider::{StaticTrackProvider, TrackProvider, TransportError};
pub use shared::SharedGraph;
pub use status::{RefreshReport, StatusKind, StatusRecord};
