//! # Geographic Utilities
//!
//! Core geographic computations for route corridor search.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance_km`] | Great-circle distance between two points |
//! | [`polyline_length_km`] | Total length of a polyline in kilometers |
//! | [`project_point_onto_segment`] | Planar projection of a point onto a segment |
//! | [`interpolate`] | Point at a fraction of a segment |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`km_to_lat_degrees`] / [`km_to_lng_degrees`] | Kilometer buffers in degrees |
//!
//! ## Example
//!
//! ```rust
//! use route_corridor::{GeoPoint, geo_utils};
//!
//! let hiroshima = GeoPoint::new(34.3853, 132.4553);
//! let okayama = GeoPoint::new(34.6551, 133.9195);
//!
//! let km = geo_utils::haversine_distance_km(&hiroshima, &okayama);
//! assert!((km - 138.0).abs() < 5.0);
//!
//! let midway = GeoPoint::new(34.52, 133.19);
//! let proj = geo_utils::project_point_onto_segment(&midway, &hiroshima, &okayama);
//! assert!(proj.t > 0.0 && proj.t < 1.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Great-circle distance on a spherical Earth, computed with `geo`'s [`Haversine`] metric.
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Local Planar Frame
//!
//! Segment projection works in a flat, kilometer-scaled frame anchored at the segment start.
//! Longitude is scaled by the cosine of the segment's mean latitude. This is accurate for
//! segments up to a few hundred kilometers, which covers regional driving routes. It is not
//! valid for trans-continental segments.

use crate::{Bounds, GeoPoint};
use geo::{Distance, Haversine, Point};

/// Earth radius used by the planar frame, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude in the planar frame.
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * (std::f64::consts::PI / 180.0);

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two points in kilometers.
///
/// Symmetric, and zero for identical points. `geo`'s haversine uses the IUGG mean
/// radius (6371.0088 km), not [`EARTH_RADIUS_KM`], so results run about 1.4 ppm longer
/// than the planar frame's scale.
///
/// # Example
///
/// ```rust
/// use route_corridor::{GeoPoint, geo_utils};
///
/// let tokyo = GeoPoint::new(35.6812, 139.7671);
/// let osaka = GeoPoint::new(34.7025, 135.4959);
///
/// let km = geo_utils::haversine_distance_km(&tokyo, &osaka);
/// assert!((km - 403.0).abs() < 5.0);
/// ```
#[inline]
pub fn haversine_distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let point1 = Point::new(a.longitude, a.latitude);
    let point2 = Point::new(b.longitude, b.latitude);
    Haversine::distance(point1, point2) / 1000.0
}

/// Total length of a polyline in kilometers.
///
/// Sums the great-circle distance between consecutive points. Empty or single-point
/// input returns 0.0.
pub fn polyline_length_km(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance_km(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Segment Projection
// =============================================================================

/// Projection of a point onto a single segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Planar distance from the point to the closest point on the segment (km)
    pub distance_km: f64,
    /// Fraction along the segment of the closest point, clamped to [0, 1]
    pub t: f64,
}

/// Project `p` onto the segment `start -> end` in a local planar frame.
///
/// The frame is anchored at `start` and scaled to kilometers: latitude by
/// [`KM_PER_DEGREE`], longitude by [`KM_PER_DEGREE`] times the cosine of the segment's
/// mean latitude. The scalar projection `t` is clamped to `[0, 1]`, so points beyond
/// either end measure their distance to that endpoint.
///
/// A zero-length segment returns the distance to `start` with `t = 0`.
///
/// # Example
///
/// ```rust
/// use route_corridor::{GeoPoint, geo_utils};
///
/// let a = GeoPoint::new(35.0, 135.0);
/// let b = GeoPoint::new(35.0, 136.0);
///
/// // Past the end of the segment: clamped to b
/// let proj = geo_utils::project_point_onto_segment(&GeoPoint::new(35.0, 137.0), &a, &b);
/// assert_eq!(proj.t, 1.0);
/// ```
pub fn project_point_onto_segment(p: &GeoPoint, start: &GeoPoint, end: &GeoPoint) -> SegmentProjection {
    let mean_lat = ((start.latitude + end.latitude) / 2.0).to_radians();
    let lat_scale = KM_PER_DEGREE;
    let lng_scale = KM_PER_DEGREE * mean_lat.cos();

    let bx = (end.longitude - start.longitude) * lng_scale;
    let by = (end.latitude - start.latitude) * lat_scale;
    let px = (p.longitude - start.longitude) * lng_scale;
    let py = (p.latitude - start.latitude) * lat_scale;

    let len2 = bx * bx + by * by;

    if len2 == 0.0 {
        return SegmentProjection {
            distance_km: (px * px + py * py).sqrt(),
            t: 0.0,
        };
    }

    let t = ((px * bx + py * by) / len2).clamp(0.0, 1.0);

    let dx = px - t * bx;
    let dy = py - t * by;

    SegmentProjection {
        distance_km: (dx * dx + dy * dy).sqrt(),
        t,
    }
}

/// Point at fraction `t` of the segment `start -> end`.
///
/// Linear in degree space, which matches the planar frame of
/// [`project_point_onto_segment`]: projecting the result back yields `t`.
#[inline]
pub fn interpolate(start: &GeoPoint, end: &GeoPoint, t: f64) -> GeoPoint {
    GeoPoint::new(
        start.latitude + t * (end.latitude - start.latitude),
        start.longitude + t * (end.longitude - start.longitude),
    )
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// For empty input, returns a bounds with MIN/MAX values that contain nothing.
pub fn compute_bounds(points: &[GeoPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

/// Convert kilometers to degrees of latitude.
#[inline]
pub fn km_to_lat_degrees(km: f64) -> f64 {
    km / KM_PER_DEGREE
}

/// Convert kilometers to degrees of longitude at the given latitude.
///
/// Longitude degrees shrink towards the poles, so the cosine is floored to keep the
/// result finite. Callers wanting a conservative buffer should pass the highest
/// absolute latitude of the area they cover.
#[inline]
pub fn km_to_lng_degrees(km: f64, latitude: f64) -> f64 {
    let cos = latitude.to_radians().cos().max(1e-6);
    (km / (KM_PER_DEGREE * cos)).min(360.0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haversine_same_point() {
        let p = GeoPoint::new(34.3853, 132.4553);
        assert_eq!(haversine_distance_km(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_symmetric() {
        let pairs = [
            (GeoPoint::new(34.3853, 132.4553), GeoPoint::new(34.6551, 133.9195)),
            (GeoPoint::new(43.0621, 141.3544), GeoPoint::new(26.2124, 127.6809)),
            (GeoPoint::new(-33.8688, 151.2093), GeoPoint::new(51.5074, -0.1278)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine_distance_km(&a, &b), haversine_distance_km(&b, &a));
        }
    }

    #[test]
    fn test_haversine_radius() {
        // One degree of latitude at the mean radius, a hair over the planar frame's degree
        let a = GeoPoint::new(35.0, 135.0);
        let b = GeoPoint::new(36.0, 135.0);
        let km = haversine_distance_km(&a, &b);
        assert_relative_eq!(km, 6371.0088 * 1.0_f64.to_radians(), max_relative = 1e-12);
        assert_relative_eq!(km / KM_PER_DEGREE, 1.0, max_relative = 2e-6);
    }

    #[test]
    fn test_haversine_known_value() {
        // One degree of latitude is ~111.2 km
        let a = GeoPoint::new(35.0, 135.0);
        let b = GeoPoint::new(36.0, 135.0);
        assert_relative_eq!(haversine_distance_km(&a, &b), 111.195, epsilon = 0.01);
    }

    #[test]
    fn test_polyline_length() {
        assert_eq!(polyline_length_km(&[]), 0.0);
        assert_eq!(polyline_length_km(&[GeoPoint::new(35.0, 135.0)]), 0.0);

        let a = GeoPoint::new(35.0, 135.0);
        let b = GeoPoint::new(35.5, 135.0);
        let c = GeoPoint::new(36.0, 135.0);
        let total = polyline_length_km(&[a, b, c]);
        assert_relative_eq!(total, haversine_distance_km(&a, &c), epsilon = 1e-9);
    }

    #[test]
    fn test_project_onto_segment_interior() {
        // East-west segment along 35N; point 0.1 degree north of the middle
        let a = GeoPoint::new(35.0, 135.0);
        let b = GeoPoint::new(35.0, 136.0);
        let p = GeoPoint::new(35.1, 135.5);

        let proj = project_point_onto_segment(&p, &a, &b);
        assert_relative_eq!(proj.t, 0.5, epsilon = 1e-12);
        assert_relative_eq!(proj.distance_km, 0.1 * KM_PER_DEGREE, epsilon = 1e-9);
    }

    #[test]
    fn test_project_onto_segment_clamps() {
        let a = GeoPoint::new(35.0, 135.0);
        let b = GeoPoint::new(36.0, 135.0);

        let before = project_point_onto_segment(&GeoPoint::new(34.0, 135.0), &a, &b);
        assert_eq!(before.t, 0.0);
        assert_relative_eq!(before.distance_km, KM_PER_DEGREE, epsilon = 1e-9);

        let after = project_point_onto_segment(&GeoPoint::new(37.5, 135.0), &a, &b);
        assert_eq!(after.t, 1.0);
        assert_relative_eq!(after.distance_km, 1.5 * KM_PER_DEGREE, epsilon = 1e-9);
    }

    #[test]
    fn test_project_onto_degenerate_segment() {
        let a = GeoPoint::new(35.0, 135.0);
        let p = GeoPoint::new(35.0, 135.1);

        let proj = project_point_onto_segment(&p, &a, &a);
        assert_eq!(proj.t, 0.0);
        let expected = 0.1 * KM_PER_DEGREE * 35.0_f64.to_radians().cos();
        assert_relative_eq!(proj.distance_km, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_interpolate_inverts_projection() {
        let a = GeoPoint::new(34.3853, 132.4553);
        let b = GeoPoint::new(34.6551, 133.9195);
        let mid = interpolate(&a, &b, 0.3);

        let proj = project_point_onto_segment(&mid, &a, &b);
        assert_relative_eq!(proj.t, 0.3, epsilon = 1e-9);
        assert!(proj.distance_km < 1e-9);
    }

    #[test]
    fn test_compute_bounds() {
        let bounds = compute_bounds(&[
            GeoPoint::new(34.0, 133.0),
            GeoPoint::new(35.0, 132.0),
            GeoPoint::new(34.5, 132.5),
        ]);
        assert_eq!(bounds.min_lat, 34.0);
        assert_eq!(bounds.max_lat, 35.0);
        assert_eq!(bounds.min_lng, 132.0);
        assert_eq!(bounds.max_lng, 133.0);
    }

    #[test]
    fn test_km_to_degrees() {
        assert_relative_eq!(km_to_lat_degrees(KM_PER_DEGREE), 1.0, epsilon = 1e-12);

        // At higher latitude the same distance spans more longitude
        let equator = km_to_lng_degrees(100.0, 0.0);
        let north = km_to_lng_degrees(100.0, 60.0);
        assert_relative_eq!(north, equator * 2.0, epsilon = 1e-9);

        // Never unbounded at the pole
        assert!(km_to_lng_degrees(100.0, 90.0) <= 360.0);
    }
}
