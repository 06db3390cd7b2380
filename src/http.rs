//! HTTP clients for Nominatim geocoding and OSRM routing.
//!
//! Both clients keep one pooled [`reqwest::Client`]. Response bodies are decoded by the
//! pure `parse_*` functions so the wire contract can be tested without a network.

use crate::config::{NominatimConfig, OsrmConfig};
use crate::geocoding::{GeocodeError, GeocodeResult, Geocoder};
use crate::route::{RoadRoute, RouteProvider, RoutingError};
use crate::GeoPoint;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Nominatim
// ============================================================================

/// One entry of a Nominatim `/search?format=json` response.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// Decode a Nominatim search response. Only the first place is used; an empty array
/// means the query has no match.
pub fn parse_nominatim_response(query: &str, body: &[u8]) -> Result<GeocodeResult, GeocodeError> {
    let places: Vec<NominatimPlace> = serde_json::from_slice(body)
        .map_err(|e| GeocodeError::Transport(format!("JSON parse error: {}", e)))?;

    let Some(place) = places.into_iter().next() else {
        return Err(GeocodeError::NotFound { query: query.to_string() });
    };

    let latitude: f64 = place
        .lat
        .trim()
        .parse()
        .map_err(|_| GeocodeError::Transport(format!("invalid latitude {:?}", place.lat)))?;
    let longitude: f64 = place
        .lon
        .trim()
        .parse()
        .map_err(|_| GeocodeError::Transport(format!("invalid longitude {:?}", place.lon)))?;

    let point = GeoPoint::new(latitude, longitude);
    if !point.is_valid() {
        return Err(GeocodeError::Transport(format!(
            "coordinate out of range ({}, {})",
            latitude, longitude
        )));
    }

    Ok(GeocodeResult { point, display_name: place.display_name })
}

/// Geocoder backed by a Nominatim instance.
pub struct NominatimClient {
    client: Client,
    config: NominatimConfig,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(GEOCODE_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }

    fn query_params<'a>(&'a self, query: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("q", query), ("format", "json"), ("limit", "1")];
        if !self.config.country_codes.is_empty() {
            params.push(("countrycodes", self.config.country_codes.as_str()));
        }
        params
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<GeocodeResult, GeocodeError> {
        let start = Instant::now();
        let resp = self
            .client
            .get(self.search_url())
            .query(&self.query_params(query))
            .header(ACCEPT_LANGUAGE, self.config.language.as_str())
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(format!("request error: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Transport(format!("HTTP {}", status)));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GeocodeError::Transport(format!("body download error: {}", e)))?;

        let result = parse_nominatim_response(query, &bytes);
        debug!(
            "[Nominatim] {:?} answered in {:?} ({} bytes)",
            query,
            start.elapsed(),
            bytes.len()
        );
        result
    }
}

// ============================================================================
// OSRM
// ============================================================================

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Metres
    distance: f64,
    /// Seconds
    duration: f64,
    geometry: Option<OsrmGeometry>,
}

/// GeoJSON LineString; coordinates are `[lng, lat]`
#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>,
}

/// Decode an OSRM `route` response requested with `geometries=geojson`.
///
/// Success needs `code == "Ok"` and a first route with distance, duration and a
/// non-empty coordinate list. Coordinates are swapped to latitude/longitude and the
/// distance converted to km.
pub fn parse_osrm_response(body: &[u8]) -> Result<RoadRoute, RoutingError> {
    let resp: OsrmResponse =
        serde_json::from_slice(body).map_err(|e| RoutingError::Malformed(e.to_string()))?;

    if resp.code != "Ok" {
        return Err(RoutingError::Status(resp.code));
    }

    let route = resp.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
    let geometry = route.geometry.ok_or(RoutingError::MissingGeometry)?;
    if geometry.coordinates.is_empty() {
        return Err(RoutingError::MissingGeometry);
    }

    let points = geometry
        .coordinates
        .iter()
        .map(|c| match c.as_slice() {
            [lng, lat, ..] => Ok(GeoPoint::new(*lat, *lng)),
            _ => Err(RoutingError::Malformed(format!("coordinate with {} values", c.len()))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RoadRoute {
        points,
        distance_km: route.distance / 1000.0,
        duration_sec: route.duration,
    })
}

/// Route provider backed by an OSRM server.
pub struct OsrmClient {
    client: Client,
    config: OsrmConfig,
}

impl OsrmClient {
    /// `timeout` bounds the whole request; callers usually apply the same bound again.
    pub fn new(config: OsrmConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config })
    }

    fn route_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            from.longitude,
            from.latitude,
            to.longitude,
            to.latitude
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RoadRoute, RoutingError> {
        let start = Instant::now();
        let resp = self
            .client
            .get(self.route_url(from, to))
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await
            .map_err(|e| RoutingError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RoutingError::Http(status.as_u16()));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RoutingError::Transport(e.to_string()))?;

        let route = parse_osrm_response(&bytes)?;
        info!(
            "[Osrm] {} points, {:.1} km in {:?} ({:.1}KB)",
            route.points.len(),
            route.distance_km,
            start.elapsed(),
            bytes.len() as f64 / 1024.0
        );
        Ok(route)
    }
}
