//! Geographic utilities.
//!
//! Distances use the haversine formula from the `geo` crate; everything else
//! works directly in degrees.

use geo::{Distance, Haversine, Point};

use crate::Coordinate;

/// Meters per degree of latitude (mean).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(p1: &Coordinate, p2: &Coordinate) -> f64 {
    let point1: Point<f64> = (*p1).into();
    let point2: Point<f64> = (*p2).into();
    Haversine::distance(point1, point2)
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Arithmetic mean of the coordinates. Returns (0, 0) for an empty input.
pub fn compute_center<I>(points: I) -> Coordinate
where
    I: IntoIterator<Item = Coordinate>,
{
    let mut lat_sum = 0.0;
    let mut lng_sum = 0.0;
    let mut n = 0usize;
    for p in points {
        lat_sum += p.latitude;
        lng_sum += p.longitude;
        n += 1;
    }
    if n == 0 {
        return Coordinate::new(0.0, 0.0);
    }
    Coordinate::new(lat_sum / n as f64, lng_sum / n as f64)
}

/// Convert a distance in meters to (latitude, longitude) spans in degrees
/// at the given latitude.
///
/// The longitude span widens toward the poles; it is capped at 360 degrees.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_deg = meters / METERS_PER_DEGREE;
    let cos_lat = latitude.to_radians().cos().abs();
    let lng_deg = if cos_lat < 1e-9 {
        360.0
    } else {
        (meters / (METERS_PER_DEGREE * cos_lat)).min(360.0)
    };
    (lat_deg, lng_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_same_point() {
        let p = Coordinate::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_known_value() {
        // London to Paris is approximately 344 km
        let london = Coordinate::new(51.5074, -0.1278);
        let paris = Coordinate::new(48.8566, 2.3522);
        assert!(approx_eq(haversine_distance(&london, &paris), 343_560.0, 5000.0));
    }

    #[test]
    fn test_polyline_length() {
        let line = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.002),
        ];
        // ~111m per 0.001 degrees at the equator
        assert!(approx_eq(polyline_length(&line), 222.4, 1.0));
        assert_eq!(polyline_length(&line[..1]), 0.0);
    }

    #[test]
    fn test_compute_center() {
        let center = compute_center(vec![Coordinate::new(51.50, -0.10), Coordinate::new(51.52, -0.12)]);
        assert!(approx_eq(center.latitude, 51.51, 1e-9));
        assert!(approx_eq(center.longitude, -0.11, 1e-9));
        assert_eq!(compute_center(Vec::new()), Coordinate::new(0.0, 0.0));
    }

    #[test]
    fn test_meters_to_degrees() {
        let (lat, lng) = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(lat, 1.0, 1e-9));
        assert!(approx_eq(lng, 1.0, 1e-9));

        // Longitude degrees are wider at 60 degrees latitude
        let (_, lng_60) = meters_to_degrees(111_320.0, 60.0);
        assert!(approx_eq(lng_60, 2.0, 1e-6));
    }
}
