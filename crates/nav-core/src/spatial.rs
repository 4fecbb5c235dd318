//! Great-circle math for segment costs.

use crate::models::Waypoint;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const METERS_PER_NM: f64 = 1_852.0;

/// Calculate distance between two points in meters (Haversine formula).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two waypoints in nautical miles.
pub fn distance_nm(a: &Waypoint, b: &Waypoint) -> f64 {
    haversine_distance(a.lat, a.lon, b.lat, b.lon) / METERS_PER_NM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_latitude_is_sixty_nm() {
        let a = Waypoint::new("A", 10.0, 20.0);
        let b = Waypoint::new("B", 11.0, 20.0);
        let nm = distance_nm(&a, &b);
        assert!((nm - 60.0).abs() < 0.1, "got {nm}");
    }
}
