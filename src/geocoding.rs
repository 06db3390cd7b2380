//! Free-text address lookup.

use crate::GeoPoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The best match for a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResult {
    pub point: GeoPoint,
    /// Provider's formatted address for the match
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeocodeError {
    /// The provider answered, but had no match
    #[error("no address found for \"{query}\"")]
    NotFound { query: String },
    /// Network failure, bad status or unreadable body
    #[error("geocoding request failed: {0}")]
    Transport(String),
}

/// Maps free text to a coordinate.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<GeocodeResult, GeocodeError>;
}
