//! # Route Acquisition
//!
//! Obtains a road-following polyline from a [`RouteProvider`] and falls back to the
//! straight line between the endpoints when the provider fails, returns nothing usable
//! or does not answer within the timeout. Routing failures are logged, never surfaced.

use crate::geo_utils::haversine_distance_km;
use crate::polyline::Polyline;
use crate::GeoPoint;
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use thiserror::Error;

/// Default hard timeout for one routing call
pub const DEFAULT_ROUTING_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("routing service returned HTTP {0}")]
    Http(u16),
    #[error("routing request failed: {0}")]
    Transport(String),
    #[error("malformed routing response: {0}")]
    Malformed(String),
    /// Service answered with a code other than "Ok"
    #[error("routing service returned code {0}")]
    Status(String),
    #[error("no route between the endpoints")]
    NoRoute,
    #[error("route has no geometry")]
    MissingGeometry,
    #[error("routing timed out after {0:?}")]
    Timeout(Duration),
}

/// A route as returned by a routing provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadRoute {
    pub points: Vec<GeoPoint>,
    pub distance_km: f64,
    pub duration_sec: f64,
}

/// Maps two coordinates to a road route.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RoadRoute, RoutingError>;
}

/// A provider that never routes, so every search uses the straight line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineOnly;

#[async_trait]
impl RouteProvider for StraightLineOnly {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RoadRoute, RoutingError> {
        Err(RoutingError::NoRoute)
    }
}

/// Ask the provider once, bounded by `timeout`.
///
/// Every failure (including an empty geometry) is logged and mapped to `None`.
pub async fn acquire_route(
    provider: &dyn RouteProvider,
    from: GeoPoint,
    to: GeoPoint,
    timeout: Duration,
) -> Option<RoadRoute> {
    let result = match tokio::time::timeout(timeout, provider.route(from, to)).await {
        Ok(result) => result,
        Err(_) => Err(RoutingError::Timeout(timeout)),
    };

    match result {
        Ok(route) if route.points.is_empty() => {
            warn!("[Route] Provider returned an empty geometry, using straight line");
            None
        }
        Ok(route) => {
            debug!(
                "[Route] Road route: {} points, {:.1} km, {:.0} s",
                route.points.len(),
                route.distance_km,
                route.duration_sec
            );
            Some(route)
        }
        Err(e) => {
            warn!("[Route] {}, using straight line", e);
            None
        }
    }
}

/// The route a search works on: a road route, or the straight-line fallback.
#[derive(Debug, Clone)]
pub struct AcquiredRoute {
    pub polyline: Polyline,
    /// Provider distance for road routes, great-circle distance for the fallback
    pub distance_km: f64,
    /// Only known for road routes
    pub duration_sec: Option<f64>,
    pub is_road_route: bool,
}

impl AcquiredRoute {
    /// The direct two-point line between the endpoints.
    pub fn straight_line(from: GeoPoint, to: GeoPoint) -> Self {
        Self {
            polyline: Polyline::new(vec![from, to]),
            distance_km: haversine_distance_km(&from, &to),
            duration_sec: None,
            is_road_route: false,
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        self.polyline.points()
    }
}

impl From<RoadRoute> for AcquiredRoute {
    fn from(route: RoadRoute) -> Self {
        Self {
            polyline: Polyline::new(route.points),
            distance_km: route.distance_km,
            duration_sec: Some(route.duration_sec),
            is_road_route: true,
        }
    }
}

/// [`acquire_route`], falling back to the straight line. Always yields a route.
pub async fn route_or_fallback(
    provider: &dyn RouteProvider,
    from: GeoPoint,
    to: GeoPoint,
    timeout: Duration,
) -> AcquiredRoute {
    match acquire_route(provider, from, to, timeout).await {
        Some(route) => route.into(),
        None => AcquiredRoute::straight_line(from, to),
    }
}
