//! Great-circle distance between coordinates.

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Haversine distance in meters.
pub fn haversine_distance(a: Coord, b: Coord) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let p = Coord::new(9.935, 53.552);
        assert_eq!(haversine_distance(p, p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = Coord::new(10.0, 50.0);
        let b = Coord::new(10.0, 51.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((haversine_distance(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn hamburg_to_berlin() {
        let hamburg = Coord::new(10.0069, 53.5530);
        let berlin = Coord::new(13.3694, 52.5251);
        let d = haversine_distance(hamburg, berlin);
        assert!((250_000.0..260_000.0).contains(&d), "got {d}");
    }
}
