//! Australian organized track definitions (TDM).
//!
//! ```text
//! TDM TRK MY14 140618233001
//! 06190000UTC - 06191400UTC
//! JAMOR IBABI LEC OOD ARNTU KEXIM CIN ATMAP
//! RTS/YMML ML H164 JAMOR
//! RMK/AUSOTS GROUP A
//! ```

use super::pacots::{is_remark, split_records};
use super::{excerpt, route_tokens, RawRecord, TrackParser};
use nav_core::TrackFamily;

#[derive(Debug, Clone, Copy, Default)]
pub struct AusotsParser;

impl TrackParser for AusotsParser {
    fn family(&self) -> TrackFamily {
        TrackFamily::Ausots
    }

    fn split(&self, text: &str) -> Vec<RawRecord> {
        split_records(text, header_ident)
            .into_iter()
            .map(|(ident, body)| {
                let route = body
                    .lines()
                    .skip(1)
                    .map(str::trim)
                    .take_while(|line| !is_remark(line))
                    .flat_map(|line| route_tokens(line).collect::<Vec<_>>())
                    .collect();
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

/// `TDM TRK <ident> [serial]`
fn header_ident(line: &str) -> Option<String> {
    let mut tokens = line.trim_start_matches('(').split_whitespace();
    if tokens.next()? != "TDM" || tokens.next()? != "TRK" {
        return None;
    }
    Some(tokens.next().unwrap_or("").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BULLETIN: &str = "\
(TDM TRK MY14 140618233001
06190000UTC - 06191400UTC
JAMOR IBABI LEC OOD ARNTU KEXIM CIN ATMAP
RTS/YMML ML H164 JAMOR
RMK/AUSOTS GROUP A)

TDM TRK BP14 140618233002
06190000UTC - 06191400UTC
TAXEG PASTA TAROR WR ENTRE MALLY NSM
RTS/YBBN BN H62 LAV Q116 TAXEG
";

    #[test]
    fn parses_tdm_records() {
        let bulletin = AusotsParser.parse(BULLETIN);
        assert!(bulletin.failures.is_empty(), "{:?}", bulletin.failures);
        let idents: Vec<&str> = bulletin.records.iter().map(|r| r.ident.as_str()).collect();
        assert_eq!(idents, vec!["MY14", "BP14"]);

        let my14 = &bulletin.records[0];
        assert_eq!(my14.airway(), "AUSOTMY14");
        assert_eq!(my14.route.first().map(String::as_str), Some("JAMOR"));
        assert_eq!(my14.route.last().map(String::as_str), Some("ATMAP"));
        assert_eq!(my14.route.len(), 8);
        assert!(my14.window.is_known());
    }

    #[test]
    fn route_stops_at_remarks() {
        let bulletin = AusotsParser.parse(BULLETIN);
        let bp14 = &bulletin.records[1];
        assert_eq!(bp14.route.len(), 7);
        assert!(!bp14.route.iter().any(|code| code == "LAV"));
    }
}
