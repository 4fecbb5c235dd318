//! Pacific organized track bulletin.
//!
//! ```text
//! TRACK 1.
//! FLEX ROUTE : KALNA 31N150E 33N160E 35N170E ONEMO
//! 11061200UTC - 11062200UTC
//! RTS/RJAA OTR11 KALNA
//! RMK/...
//! ```

use super::{excerpt, route_tokens, RawRecord, TrackParser};
use nav_core::TrackFamily;

const ROUTE_PREFIX: &str = "FLEX ROUTE";

#[derive(Debug, Clone, Copy, Default)]
pub struct PacotsParser;

impl TrackParser for PacotsParser {
    fn family(&self) -> TrackFamily {
        TrackFamily::Pacots
    }

    fn split(&self, text: &str) -> Vec<RawRecord> {
        split_records(text, header_ident)
            .into_iter()
            .map(|(ident, body)| {
                let mut route = Vec::new();
                for line in body.lines().skip(1) {
                    let line = line.trim();
                    if is_remark(line) {
                        break;
                    }
                    let line = strip_route_prefix(line);
                    route.extend(route_tokens(line));
                }
                RawRecord {
                    ident,
                    route,
                    excerpt: excerpt(&body),
                    scan_text: body,
                }
            })
            .collect()
    }
}

/// `TRACK 1.` or `TRACK A`
fn header_ident(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "TRACK" {
        return None;
    }
    let ident = tokens.next().unwrap_or("").trim_end_matches('.');
    Some(ident.to_string())
}

fn strip_route_prefix(line: &str) -> &str {
    match line.strip_prefix(ROUTE_PREFIX) {
        Some(rest) => rest.trim_start().trim_start_matches(':'),
        None => line,
    }
}

pub(crate) fn is_remark(line: &str) -> bool {
    line.starts_with("RTS/") || line.starts_with("RMK/")
}

/// Cut `text` into `(ident, body)` blocks, each starting at a header line
/// recognized by `header`. Text before the first header is dropped.
pub(crate) fn split_records<F>(text: &str, header: F) -> Vec<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut records = Vec::new();
    let mut current: Option<(String, String)> = None;
    for line in text.lines() {
        if let Some(ident) = header(line.trim()) {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = Some((ident, String::new()));
        }
        if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    records.extend(current);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_core::ValidityWindow;

    const BULLETIN: &str = "\
PACOTS TRACKS FOR 1106
TRACK 1.
FLEX ROUTE : KALNA 31N150E 33N160E 35N170E ONEMO
11061200UTC - 11062200UTC
RTS/RJAA OTR11 KALNA
RMK/ACFT LDG KSFO
TRACK 2.
FLEX ROUTE : OBAKO 34N150E 36N160E
 38N170E ADNAP
11061200UTC
TRACK 3.
FLEX ROUTE : SEALS 1200UTC 1206001200UTC
";

    #[test]
    fn parses_records_and_windows() {
        let bulletin = PacotsParser.parse(BULLETIN);
        assert_eq!(bulletin.records.len(), 2);

        let one = &bulletin.records[0];
        assert_eq!(one.ident, "1");
        assert_eq!(one.route, vec!["KALNA", "31N150E", "33N160E", "35N170E", "ONEMO"]);
        assert_eq!(
            one.window,
            ValidityWindow::Known {
                start: "11061200UTC".to_string(),
                end: "11062200UTC".to_string(),
            }
        );

        let two = &bulletin.records[1];
        assert_eq!(two.route.len(), 5);
        assert_eq!(two.window, ValidityWindow::Unknown);
    }

    #[test]
    fn malformed_record_is_reported_not_fatal() {
        let bulletin = PacotsParser.parse(BULLETIN);
        assert_eq!(bulletin.failures.len(), 1);
        let failure = &bulletin.failures[0];
        assert_eq!(failure.ident.as_deref(), Some("3"));
        assert!(failure.reason.contains("1200UTC"), "{}", failure.reason);
        assert!(failure.excerpt.starts_with("TRACK 3."));
    }

    #[test]
    fn duplicate_identifier_keeps_first() {
        let text = "TRACK 4\n AAA BBB\nTRACK 4\n CCC DDD\n";
        let bulletin = PacotsParser.parse(text);
        assert_eq!(bulletin.records.len(), 1);
        assert_eq!(bulletin.records[0].route, vec!["AAA", "BBB"]);
        assert_eq!(bulletin.failures.len(), 1);
    }

    #[test]
    fn missing_identifier_fails() {
        let bulletin = PacotsParser.parse("TRACK\n AAA BBB\n");
        assert!(bulletin.records.is_empty());
        assert_eq!(bulletin.failures[0].ident, None);
    }
}
