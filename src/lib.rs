//! # Route Corridor
//!
//! Find points of interest (truck parking, campgrounds) along a driving route.
//!
//! This library provides:
//! - Perpendicular distance and normalized route position of a point against a polyline
//! - Road route acquisition with a straight-line fallback
//! - Corridor filtering by distance and capability, with optional rest-interval sampling
//! - A search planner that geocodes endpoints, routes, and commits only the latest result
//!
//! ## Features
//!
//! - **`parallel`** - Project candidates in parallel with rayon
//! - **`http`** - Nominatim geocoding and OSRM routing clients
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_corridor::{GeoPoint, Polyline};
//!
//! let route = Polyline::new(vec![
//!     GeoPoint::new(34.3853, 132.4553), // Hiroshima
//!     GeoPoint::new(34.6551, 133.9195), // Okayama
//! ]);
//!
//! let lot = GeoPoint::new(34.52, 133.18);
//! let projection = route.project(&lot);
//! println!("{:.1} km off route at {:.0}%", projection.distance_km, projection.position * 100.0);
//! ```

use serde::{Deserialize, Serialize};

pub mod geo_utils;

pub mod polyline;
pub use polyline::{project_point_onto_polyline, Polyline, PolylineProjection};

pub mod candidate;
pub use candidate::{
    Candidate, CandidateDirectory, Capability, ChangeCallback, InMemoryDirectory, Subscription,
};

pub mod corridor;
pub use corridor::{
    project_candidates, rest_targets, select_candidates, CandidateIndex, CorridorMatch,
    SelectionPolicy,
};

pub mod rate_limit;
pub use rate_limit::DispatchRateLimiter;

pub mod geocoding;
pub use geocoding::{GeocodeError, GeocodeResult, Geocoder};

pub mod route;
pub use route::{
    acquire_route, route_or_fallback, AcquiredRoute, RoadRoute, RouteProvider, RoutingError,
    StraightLineOnly,
};

pub mod config;
pub use config::{NominatimConfig, OsrmConfig, PlannerConfig};

pub mod error;
pub use error::SearchError;

pub mod planner;
pub use planner::{
    CommitStatus, PlannerState, RoutePlanner, SearchOutcome, SearchParams, SearchPhase,
    SearchTicket,
};

// Nominatim and OSRM clients
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{parse_nominatim_response, parse_osrm_response, NominatimClient, OsrmClient};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use route_corridor::GeoPoint;
/// let point = GeoPoint::new(34.3853, 132.4553); // Hiroshima
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for empty input.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Grow the box by the given margins (degrees) on every side.
    pub fn expand(&self, lat_margin: f64, lng_margin: f64) -> Self {
        Self {
            min_lat: self.min_lat - lat_margin,
            max_lat: self.max_lat + lat_margin,
            min_lng: self.min_lng - lng_margin,
            max_lng: self.max_lng + lng_margin,
        }
    }

    /// Largest absolute latitude inside the box.
    pub fn max_abs_lat(&self) -> f64 {
        self.min_lat.abs().max(self.max_lat.abs())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(34.3853, 132.4553).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_from_points() {
        assert!(Bounds::from_points(&[]).is_none());

        let bounds = Bounds::from_points(&[
            GeoPoint::new(34.0, 133.0),
            GeoPoint::new(35.0, 132.0),
        ])
        .unwrap();
        assert_eq!(bounds.min_lat, 34.0);
        assert_eq!(bounds.max_lat, 35.0);
        assert_eq!(bounds.min_lng, 132.0);
        assert_eq!(bounds.max_lng, 133.0);
        assert_eq!(bounds.max_abs_lat(), 35.0);
    }

    #[test]
    fn test_bounds_expand() {
        let bounds = Bounds { min_lat: 34.0, max_lat: 35.0, min_lng: 132.0, max_lng: 133.0 };
        let grown = bounds.expand(0.5, 1.0);
        assert_eq!(grown.min_lat, 33.5);
        assert_eq!(grown.max_lat, 35.5);
        assert_eq!(grown.min_lng, 131.0);
        assert_eq!(grown.max_lng, 134.0);
    }

    #[test]
    fn test_point_serde_field_names() {
        let json = serde_json::to_string(&GeoPoint::new(34.5, 133.25)).unwrap();
        assert_eq!(json, r#"{"latitude":34.5,"longitude":133.25}"#);
    }
}
