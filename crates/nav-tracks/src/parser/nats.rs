//! North Atlantic track message.
//!
//! ```text
//! NAT TRACKS FLS 310/390 11061130UTC TO 11061900UTC
//! A MALOT 62/20 63/30 64/40 64/50 PRAWN
//! EAST LVLS NIL
//! WEST LVLS 310 320 330
//! B ...
//! ```
//!
//! The validity stamps live in the message header and apply to every track
//! in the message. A bulletin may carry several messages back to back; a
//! line that follows a remark block and is neither a track nor a remark
//! starts the next message header.

use super::{excerpt, route_tokens, RawRecord, TrackParser};
use nav_core::TrackFamily;

const REMARK_PREFIXES: [&str; 4] = ["EAST LVLS", "WEST LVLS", "EUR RTS", "NAR"];

#[derive(Debug, Clone, Copy, Default)]
pub struct NatsParser;

impl TrackParser for NatsParser {
    fn family(&self) -> TrackFamily {
        TrackFamily::Nats
    }

    fn split(&self, text: &str) -> Vec<RawRecord> {
        let mut header = String::new();
        let mut records = Vec::new();
        let mut current: Option<(RawRecord, bool)> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some((ident, rest)) = track_line(trimmed) {
                if let Some((record, _)) = current.take() {
                    records.push(finalize(record));
                }
                current = Some((
                    RawRecord {
                        ident: ident.to_string(),
                        route: route_tokens(rest).collect(),
                        scan_text: format!("{header}\n{trimmed}\n"),
                        excerpt: format!("{trimmed}\n"),
                    },
                    false,
                ));
                continue;
            }

            // Text after a remark block that is not a track or another
            // remark opens the next message, with its own window.
            if matches!(&current, Some((_, true))) && !is_remark(trimmed) {
                if let Some((record, _)) = current.take() {
                    records.push(finalize(record));
                }
                header.clear();
            }

            match current.as_mut() {
                None => {
                    header.push_str(trimmed);
                    header.push('\n');
                }
                Some((record, in_remarks)) => {
                    record.scan_text.push_str(trimmed);
                    record.scan_text.push('\n');
                    record.excerpt.push_str(trimmed);
                    record.excerpt.push('\n');
                    if *in_remarks || is_remark(trimmed) {
                        *in_remarks = true;
                    } else {
                        record.route.extend(route_tokens(trimmed));
                    }
                }
            }
        }
        if let Some((record, _)) = current {
            records.push(finalize(record));
        }
        records
    }
}

fn finalize(mut record: RawRecord) -> RawRecord {
    record.excerpt = excerpt(&record.excerpt);
    record
}

/// `A MALOT 62/20 ...`: a lone capital letter followed by the route.
fn track_line(line: &str) -> Option<(&str, &str)> {
    let (first, rest) = line.split_once(char::is_whitespace)?;
    let is_letter = first.len() == 1 && first.bytes().all(|b| b.is_ascii_uppercase());
    (is_letter && !rest.trim().is_empty()).then_some((first, rest))
}

fn is_remark(line: &str) -> bool {
    REMARK_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}
