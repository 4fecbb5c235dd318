//! Validity window extraction.
//!
//! A stamp is exactly 8 digits followed by `UTC` (`11061200UTC`). The scan
//! walks left to right; when a character breaks a partial match the scan
//! resumes after the next delimiter that follows it. A delimiter that breaks
//! the match therefore skips the whole following token, so two stamps are
//! only both seen when something separates them (`11061130UTC TO
//! 11061900UTC`). A window is accepted only when two stamps are found,
//! otherwise it is reported as unknown. With no delimiter left the scan
//! ends.

use nav_core::ValidityWindow;

const STAMP_LEN: usize = 11;
const DELIMITERS: [u8; 4] = [b' ', b'\n', b'\r', b'\t'];

pub fn find_validity(text: &str) -> ValidityWindow {
    let mut index = 0;
    let Some(start) = find_timestamp(text, &mut index) else {
        return ValidityWindow::Unknown;
    };
    match find_timestamp(text, &mut index) {
        Some(end) => ValidityWindow::Known {
            start: start.to_string(),
            end: end.to_string(),
        },
        None => ValidityWindow::Unknown,
    }
}

/// Next stamp at or after `*index`; on success `*index` moves past it.
pub fn find_timestamp<'a>(text: &'a str, index: &mut usize) -> Option<&'a str> {
    let bytes = text.as_bytes();
    let mut current = *index;
    let mut matched = 0;

    while current < bytes.len() {
        if stamp_char_matches(matched, bytes[current]) {
            if matched == STAMP_LEN - 1 {
                *index = current + 1;
                return text.get(current + 1 - STAMP_LEN..=current);
            }
            current += 1;
            matched += 1;
        } else {
            // Resume after the first delimiter past the breaking character,
            // even when that character is itself a delimiter.
            let next_delimiter = bytes[current + 1..]
                .iter()
                .position(|b| DELIMITERS.contains(b))?;
            current = current + 1 + next_delimiter + 1;
            matched = 0;
        }
    }
    None
}

/// Whether `token` is exactly one stamp.
pub fn is_timestamp(token: &str) -> bool {
    token.len() == STAMP_LEN
        && token
            .bytes()
            .enumerate()
            .all(|(i, b)| stamp_char_matches(i, b))
}

fn stamp_char_matches(position: usize, c: u8) -> bool {
    match position {
        0..=7 => c.is_ascii_digit(),
        8 => c == b'U',
        9 => c == b'T',
        10 => c == b'C',
        _ => false,
    }
}
