//! Waypoint code validation and coordinate-bearing codes.
//!
//! Supported coordinate forms:
//! - `62/20`, `6230/20`: NAT shorthand, north latitude / west longitude
//! - `31N150E`: whole degrees
//! - `3130N15030E`: degrees and minutes

/// Named fix or airport code: a letter followed by up to four alphanumerics.
pub fn is_named_code(token: &str) -> bool {
    let bytes = token.as_bytes();
    (2..=5).contains(&bytes.len())
        && bytes[0].is_ascii_uppercase()
        && bytes
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

pub fn is_waypoint_token(token: &str) -> bool {
    is_named_code(token) || parse_coordinate(token).is_some()
}

/// Position encoded in a coordinate code, as `(lat, lon)` in degrees.
pub fn parse_coordinate(code: &str) -> Option<(f64, f64)> {
    if !code.is_ascii() {
        return None;
    }
    if let Some((lat, lon)) = code.split_once('/') {
        return parse_nat_shorthand(lat, lon);
    }
    parse_hemisphere_form(code)
}

fn parse_nat_shorthand(lat: &str, lon: &str) -> Option<(f64, f64)> {
    let lat = match lat.len() {
        2 => degrees(lat, 0)?,
        4 => degrees(&lat[..2], minutes(&lat[2..])?)?,
        _ => return None,
    };
    if !(2..=3).contains(&lon.len()) {
        return None;
    }
    let lon = degrees(lon, 0)?;
    checked(lat, -lon)
}

fn parse_hemisphere_form(code: &str) -> Option<(f64, f64)> {
    let split = code.find(|c: char| c == 'N' || c == 'S')?;
    let (lat_digits, rest) = code.split_at(split);
    let (ns, rest) = rest.split_at(1);
    let (lon_digits, ew) = rest.split_at(rest.len().checked_sub(1)?);

    let lat = match lat_digits.len() {
        2 => degrees(lat_digits, 0)?,
        4 => degrees(&lat_digits[..2], minutes(&lat_digits[2..])?)?,
        _ => return None,
    };
    let lon = match lon_digits.len() {
        3 => degrees(lon_digits, 0)?,
        5 => degrees(&lon_digits[..3], minutes(&lon_digits[3..])?)?,
        _ => return None,
    };

    let lat = if ns == "S" { -lat } else { lat };
    let lon = match ew {
        "E" => lon,
        "W" => -lon,
        _ => return None,
    };
    checked(lat, lon)
}

fn degrees(digits: &str, minutes: u32) -> Option<f64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: u32 = digits.parse().ok()?;
    Some(whole as f64 + minutes as f64 / 60.0)
}

fn minutes(digits: &str) -> Option<u32> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = digits.parse().ok()?;
    (value < 60).then_some(value)
}

fn checked(lat: f64, lon: f64) -> Option<(f64, f64)> {
    (lat.abs() <= 90.0 && lon.abs() <= 180.0).then_some((lat, lon))
}
