use crate::geocoding::GeocodeError;
use thiserror::Error;

/// Why a search failed. Routing failures never appear here; they fall back to the
/// straight line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    /// Rejected before any network call
    #[error("invalid search parameters: {0}")]
    InvalidParameters(String),

    /// Shown to the user as is, so they can correct the address
    #[error("no address found for \"{query}\"")]
    GeocodingNotFound { query: String },

    /// Detail kept for logs, the message stays generic
    #[error("address lookup failed")]
    GeocodingTransport(String),
}

impl From<GeocodeError> for SearchError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NotFound { query } => SearchError::GeocodingNotFound { query },
            GeocodeError::Transport(detail) => SearchError::GeocodingTransport(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_geocode_error() {
        let err: SearchError = GeocodeError::NotFound { query: "Hiroshima".to_string() }.into();
        assert_eq!(err, SearchError::GeocodingNotFound { query: "Hiroshima".to_string() });
        assert_eq!(err.to_string(), "no address found for \"Hiroshima\"");

        let err: SearchError = GeocodeError::Transport("connection reset".to_string()).into();
        assert_eq!(err.to_string(), "address lookup failed");
        assert_eq!(err, SearchError::GeocodingTransport("connection reset".to_string()));
    }
}
