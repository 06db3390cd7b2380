//! Planner configuration: provider endpoints, request spacing and timeouts.
//!
//! Every field has a default, so a JSON override only needs the fields it changes:
//!
//! ```
//! use route_corridor::PlannerConfig;
//!
//! let config = PlannerConfig::from_json(r#"{"routingTimeoutMs": 5000}"#).unwrap();
//! assert_eq!(config.routing_timeout_ms, 5000);
//! assert_eq!(config.geocode_interval_ms, 1100);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Nominatim search endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NominatimConfig {
    pub base_url: String,
    /// `countrycodes` filter; empty for worldwide
    pub country_codes: String,
    /// Sent as `Accept-Language`
    pub language: String,
    /// Nominatim's usage policy requires an identifying agent
    pub user_agent: String,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            country_codes: "jp".to_string(),
            language: "ja".to_string(),
            user_agent: concat!("route-corridor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// OSRM route service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
        }
    }
}

/// Configuration for a [`RoutePlanner`](crate::RoutePlanner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannerConfig {
    /// Minimum spacing between geocoding request starts (ms)
    pub geocode_interval_ms: u64,
    /// Hard timeout for the routing call (ms)
    pub routing_timeout_ms: u64,
    pub nominatim: NominatimConfig,
    pub osrm: OsrmConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            geocode_interval_ms: 1100,
            routing_timeout_ms: 8000,
            nominatim: NominatimConfig::default(),
            osrm: OsrmConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Parse a (partial) JSON override on top of the defaults. The input must be an
    /// object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("planner config must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    pub fn geocode_interval(&self) -> Duration {
        Duration::from_millis(self.geocode_interval_ms)
    }

    pub fn routing_timeout(&self) -> Duration {
        Duration::from_millis(self.routing_timeout_ms)
    }
}
