//! # Polyline Projection
//!
//! Nearest distance from a point to a route polyline, and the normalized position
//! (0.0 = start, 1.0 = end) of the nearest point along the route.
//!
//! Every segment is projected exactly (closed form, see
//! [`geo_utils::project_point_onto_segment`]) and the segment with the smallest distance
//! wins. Ties go to the earliest segment along the route. The winning segment's local
//! fraction is then mapped to a global position using great-circle segment lengths.

use crate::geo_utils::{self, SegmentProjection};
use crate::GeoPoint;

/// Result of projecting a point onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineProjection {
    /// Distance from the point to the route (km)
    pub distance_km: f64,
    /// Normalized position of the nearest point along the route, in [0, 1]
    pub position: f64,
}

/// A route polyline with precomputed segment lengths.
///
/// Build once per route and project every candidate against it; segment lengths and
/// cumulative offsets are not recomputed per point.
#[derive(Debug, Clone)]
pub struct Polyline {
    points: Vec<GeoPoint>,
    /// Great-circle length of each segment (km)
    segment_lengths: Vec<f64>,
    /// Route distance before each segment starts (km)
    cumulative: Vec<f64>,
    total_length: f64,
}

/// Winning segment of a projection.
#[derive(Debug, Clone, Copy)]
struct NearestSegment {
    index: usize,
    projection: SegmentProjection,
}

impl Polyline {
    /// Create a polyline from ordered points.
    pub fn new(points: Vec<GeoPoint>) -> Self {
        let segment_lengths: Vec<f64> = points
            .windows(2)
            .map(|w| geo_utils::haversine_distance_km(&w[0], &w[1]))
            .collect();

        let mut cumulative = Vec::with_capacity(segment_lengths.len());
        let mut total_length = 0.0;
        for len in &segment_lengths {
            cumulative.push(total_length);
            total_length += len;
        }

        Self { points, segment_lengths, cumulative, total_length }
    }

    /// The route points in order.
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Total great-circle length (km).
    pub fn length_km(&self) -> f64 {
        self.total_length
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Project a point onto the route.
    ///
    /// - Empty polyline: distance 0, position 0.
    /// - Single point: great-circle distance to it, position 0.
    /// - Otherwise: minimum planar distance over all segments, with the position of the
    ///   nearest point normalized by the total route length (0 if the route has no length).
    pub fn project(&self, p: &GeoPoint) -> PolylineProjection {
        if self.points.len() < 2 {
            let distance_km = self
                .points
                .first()
                .map_or(0.0, |only| geo_utils::haversine_distance_km(p, only));
            return PolylineProjection { distance_km, position: 0.0 };
        }

        let Some(nearest) = self.nearest_segment(p) else {
            return PolylineProjection { distance_km: 0.0, position: 0.0 };
        };

        let position = if self.segment_lengths.len() == 1 {
            // A single segment's fraction is already the route position
            nearest.projection.t
        } else if self.total_length > 0.0 {
            let along = self.cumulative[nearest.index]
                + nearest.projection.t * self.segment_lengths[nearest.index];
            along / self.total_length
        } else {
            0.0
        };

        PolylineProjection {
            distance_km: nearest.projection.distance_km,
            position,
        }
    }

    /// The closest point on the route to `p` (the foot of the perpendicular on the
    /// winning segment). Returns `None` for an empty polyline.
    pub fn closest_point(&self, p: &GeoPoint) -> Option<GeoPoint> {
        match self.points.len() {
            0 => None,
            1 => Some(self.points[0]),
            _ => {
                let nearest = self.nearest_segment(p)?;
                let start = &self.points[nearest.index];
                let end = &self.points[nearest.index + 1];
                Some(geo_utils::interpolate(start, end, nearest.projection.t))
            }
        }
    }

    /// Point at a normalized position along the route.
    ///
    /// `position` is clamped to [0, 1]. Inverse of [`Polyline::project`] for points that
    /// lie on the route.
    pub fn point_at_position(&self, position: f64) -> Option<GeoPoint> {
        let first = *self.points.first()?;
        if self.points.len() < 2 || self.total_length <= 0.0 {
            return Some(first);
        }

        let target = position.clamp(0.0, 1.0) * self.total_length;

        // Last segment whose start is at or before the target distance
        let index = self
            .cumulative
            .partition_point(|&before| before <= target)
            .saturating_sub(1);

        let seg_len = self.segment_lengths[index];
        let t = if seg_len > 0.0 {
            ((target - self.cumulative[index]) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some(geo_utils::interpolate(&self.points[index], &self.points[index + 1], t))
    }

    fn nearest_segment(&self, p: &GeoPoint) -> Option<NearestSegment> {
        let mut best: Option<NearestSegment> = None;

        for (index, w) in self.points.windows(2).enumerate() {
            let projection = geo_utils::project_point_onto_segment(p, &w[0], &w[1]);
            // Strict comparison keeps the earliest segment on ties
            let better = best.map_or(true, |b| projection.distance_km < b.projection.distance_km);
            if better {
                best = Some(NearestSegment { index, projection });
            }
        }

        best
    }
}

impl From<Vec<GeoPoint>> for Polyline {
    fn from(points: Vec<GeoPoint>) -> Self {
        Self::new(points)
    }
}

/// Project a point onto a polyline given as a slice.
///
/// Convenience wrapper around [`Polyline::project`] for one-off queries. When projecting
/// many points against the same route, build a [`Polyline`] once instead.
///
/// # Example
///
/// ```rust
/// use route_corridor::{GeoPoint, project_point_onto_polyline};
///
/// let route = [GeoPoint::new(35.0, 135.0), GeoPoint::new(35.0, 136.0)];
/// let proj = project_point_onto_polyline(&GeoPoint::new(35.0, 135.5), &route);
/// assert!(proj.distance_km < 1e-9);
/// assert!((proj.position - 0.5).abs() < 1e-9);
/// ```
pub fn project_point_onto_polyline(p: &GeoPoint, points: &[GeoPoint]) -> PolylineProjection {
    Polyline::new(points.to_vec()).project(p)
}
