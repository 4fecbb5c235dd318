//! Track bulletin parsing.
//!
//! Each family splits its bulletin into raw records; the shared step below
//! validates the route, extracts the validity window and drops records that
//! cannot be used. A bad record never aborts the rest of the bulletin.

pub mod ausots;
pub mod coords;
pub mod nats;
pub mod pacots;
pub mod validity;

use nav_core::{TrackFamily, ValidityWindow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

const EXCERPT_CHARS: usize = 80;

/// One published track, ready to be installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub family: TrackFamily,
    pub ident: String,
    /// Ordered waypoint codes, named or coordinate-bearing.
    pub route: Vec<String>,
    pub window: ValidityWindow,
}

impl TrackRecord {
    pub fn airway(&self) -> String {
        self.family.airway_name(&self.ident)
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.family.hash(&mut hasher);
        self.ident.hash(&mut hasher);
        self.route.hash(&mut hasher);
        self.window.hash(&mut hasher);
        hasher.finish()
    }
}

/// A record that was dropped, with enough context to report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub family: TrackFamily,
    pub ident: Option<String>,
    pub reason: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedBulletin {
    pub records: Vec<TrackRecord>,
    pub failures: Vec<ParseFailure>,
}

/// Family-specific split of a bulletin into raw records.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub ident: String,
    pub route: Vec<String>,
    /// Text scanned for validity stamps.
    pub scan_text: String,
    pub excerpt: String,
}

pub trait TrackParser {
    fn family(&self) -> TrackFamily;

    fn split(&self, text: &str) -> Vec<RawRecord>;

    fn parse(&self, text: &str) -> ParsedBulletin {
        let family = self.family();
        let mut bulletin = ParsedBulletin::default();
        let mut seen = HashSet::new();

        for raw in self.split(text) {
            match finish_record(family, raw) {
                Ok(record) if !seen.insert(record.ident.clone()) => {
                    bulletin.failures.push(ParseFailure {
                        family,
                        ident: Some(record.ident.clone()),
                        reason: "duplicate track identifier".to_string(),
                        excerpt: record.route.join(" "),
                    });
                }
                Ok(record) => bulletin.records.push(record),
                Err(failure) => bulletin.failures.push(failure),
            }
        }
        bulletin
    }
}

pub fn parser_for(family: TrackFamily) -> Box<dyn TrackParser + Send + Sync> {
    match family {
        TrackFamily::Nats => Box::new(nats::NatsParser),
        TrackFamily::Pacots => Box::new(pacots::PacotsParser),
        TrackFamily::Ausots => Box::new(ausots::AusotsParser),
    }
}

pub fn parse_bulletin(family: TrackFamily, text: &str) -> ParsedBulletin {
    parser_for(family).parse(text)
}

fn finish_record(family: TrackFamily, raw: RawRecord) -> Result<TrackRecord, ParseFailure> {
    let fail = |ident: Option<String>, reason: String| ParseFailure {
        family,
        ident,
        reason,
        excerpt: raw.excerpt.clone(),
    };

    if raw.ident.is_empty() {
        return Err(fail(None, "missing track identifier".to_string()));
    }

    let mut route = Vec::with_capacity(raw.route.len());
    for token in &raw.route {
        if validity::is_timestamp(token) {
            continue;
        }
        if !coords::is_waypoint_token(token) {
            return Err(fail(
                Some(raw.ident.clone()),
                format!("invalid waypoint token '{token}'"),
            ));
        }
        route.push(token.clone());
    }
    if route.len() < 2 {
        return Err(fail(
            Some(raw.ident.clone()),
            format!("route needs at least 2 waypoints, found {}", route.len()),
        ));
    }

    Ok(TrackRecord {
        family,
        window: validity::find_validity(&raw.scan_text),
        ident: raw.ident,
        route,
    })
}

/// Leading slice of a record's text for diagnostics.
pub(crate) fn excerpt(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// Route tokens of a line, with trailing message punctuation removed.
pub(crate) fn route_tokens(line: &str) -> impl Iterator<Item = String> + '_ {
    line.split_whitespace()
        .map(|token| token.trim_end_matches(['-', ')', '.']).to_string())
        .filter(|token| !token.is_empty())
}
