pub mod error;
pub mod graph;
pub mod models;
pub mod search;
pub mod spatial;
pub mod store;

pub use error::{GraphError, SearchError};
pub use graph::{Edge, EdgeId, NavGraph, NodeId};
pub use models::{AirwaySegment, EdgeKind, TrackFamily, TrackTag, ValidityWindow, Waypoint};
pub use search::{RouteLeg, RoutePath, RouteSearch, SearchOptions};
pub use spatial::{distance_nm, haversine_distance};
pub use store::{Handle, StableIndexStore};
