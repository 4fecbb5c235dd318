//! Core data models for the navigation graph.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named navigation fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub code: String,
    pub lat: f64,
    pub lon: f64,
}

impl Waypoint {
    pub fn new(code: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            code: code.into(),
            lat,
            lon,
        }
    }
}

/// Organized track system publishing a bulletin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackFamily {
    /// North Atlantic tracks
    Nats,
    /// Pacific organized tracks
    Pacots,
    /// Australian organized tracks
    Ausots,
}

impl TrackFamily {
    pub const ALL: [TrackFamily; 3] = [TrackFamily::Nats, TrackFamily::Pacots, TrackFamily::Ausots];

    /// Prefix prepended to a track identifier to form its airway name.
    pub fn airway_prefix(self) -> &'static str {
        match self {
            TrackFamily::Nats => "NAT",
            TrackFamily::Pacots => "PACOT",
            TrackFamily::Ausots => "AUSOT",
        }
    }

    pub fn airway_name(self, ident: &str) -> String {
        format!("{}{}", self.airway_prefix(), ident)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackFamily::Nats => "nats",
            TrackFamily::Pacots => "pacots",
            TrackFamily::Ausots => "ausots",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nats" | "nat" => Some(TrackFamily::Nats),
            "pacots" | "pacot" => Some(TrackFamily::Pacots),
            "ausots" | "ausot" => Some(TrackFamily::Ausots),
            _ => None,
        }
    }
}

impl fmt::Display for TrackFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open publication window of a track, kept as the raw `MMDDHHMMUTC`
/// stamps found in the bulletin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidityWindow {
    /// The bulletin did not carry exactly two stamps for this track.
    #[default]
    Unknown,
    Known { start: String, end: String },
}

impl ValidityWindow {
    pub fn is_known(&self) -> bool {
        matches!(self, ValidityWindow::Known { .. })
    }

    /// Resolve the stamps against the year of `reference`.
    ///
    /// Stamps carry no year, so a start more than half a year away from the
    /// reference is moved into the adjacent year, and an end earlier than the
    /// start rolls into the next year.
    pub fn resolve(&self, reference: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let ValidityWindow::Known { start, end } = self else {
            return None;
        };
        let year = reference.year();
        let mut start_at = parse_stamp(start, year)?;
        let half_year = Duration::days(183);
        if start_at - reference > half_year {
            start_at = parse_stamp(start, year - 1)?;
        } else if reference - start_at > half_year {
            start_at = parse_stamp(start, year + 1)?;
        }

        let mut end_at = parse_stamp(end, start_at.year())?;
        if end_at < start_at {
            end_at = parse_stamp(end, start_at.year() + 1)?;
        }
        Some((start_at, end_at))
    }

    /// Whether `at` falls inside the window. Unknown or unreadable windows
    /// never exclude anything.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match self.resolve(at) {
            Some((start, end)) => start <= at && at < end,
            None => true,
        }
    }
}

fn parse_stamp(stamp: &str, year: i32) -> Option<DateTime<Utc>> {
    let digits = stamp.get(..8)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month: u32 = digits[0..2].parse().ok()?;
    let day: u32 = digits[2..4].parse().ok()?;
    let hour: u32 = digits[4..6].parse().ok()?;
    let minute: u32 = digits[6..8].parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Tag carried by every track edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackTag {
    pub family: TrackFamily,
    pub ident: String,
    pub window: ValidityWindow,
    /// Content fingerprint of the record the edge was built from.
    pub fingerprint: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeKind {
    /// Airway loaded from static data.
    Permanent,
    Track(TrackTag),
}

impl EdgeKind {
    pub fn track(&self) -> Option<&TrackTag> {
        match self {
            EdgeKind::Track(tag) => Some(tag),
            EdgeKind::Permanent => None,
        }
    }

    pub fn is_track(&self) -> bool {
        matches!(self, EdgeKind::Track(_))
    }
}

/// Static airway segment referencing waypoints by position in the list
/// handed to `NavGraph::load_permanent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirwaySegment {
    pub from: usize,
    pub to: usize,
    pub airway: String,
    /// Defaults to the great-circle distance in nautical miles.
    #[serde(default)]
    pub cost: Option<f64>,
}
