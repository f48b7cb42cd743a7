//! Error types for geoscope.
//!
//! Construction-time structural problems fail immediately with
//! [`GeoscopeError::Geometry`]. Algorithmic "no answer" outcomes (no route,
//! no cluster, empty overlay) are not errors; they surface as `None` or empty
//! collections.

use thiserror::Error;

/// Errors raised by the toolkit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoscopeError {
    /// Structural malformation: too few positions, unclosed ring, no rings,
    /// empty multi container.
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Unknown relationship name, unsupported geometry pairing, or a network
    /// with a negative cycle.
    #[error("Topology error: {0}")]
    Topology(String),

    /// Unregistered CRS code, malformed UTM code or unsupported definition.
    #[error("Projection error: {0}")]
    Projection(String),

    /// Bad parameters (non-finite distances, unknown node ids, k out of range).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// GeoJSON or JSON conversion failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration rejected by `Config::validate`.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A cooperative cancellation token was triggered.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for GeoscopeError {
    fn from(err: serde_json::Error) -> Self {
        GeoscopeError::Serialization(err.to_string())
    }
}

/// Structural problems in otherwise well-formed JSON are geometry errors;
/// everything else is a serialization error.
impl From<geojson::Error> for GeoscopeError {
    fn from(err: geojson::Error) -> Self {
        match err {
            geojson::Error::PositionTooShort(_)
            | geojson::Error::ExpectedF64Value
            | geojson::Error::ExpectedArrayValue(_)
            | geojson::Error::GeometryUnknownType(_)
            | geojson::Error::InvalidGeometryConversion { .. }
            | geojson::Error::FeatureHasNoGeometry(_) => GeoscopeError::Geometry(err.to_string()),
            _ => GeoscopeError::Serialization(err.to_string()),
        }
    }
}

/// Result type for geoscope operations.
pub type Result<T> = std::result::Result<T, GeoscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GeoscopeError::Geometry("ring 0 is not closed".into());
        assert_eq!(err.to_string(), "Geometry error: ring 0 is not closed");
        assert_eq!(GeoscopeError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_from_serde_json() {
        let err: GeoscopeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, GeoscopeError::Serialization(_)));
    }

    #[test]
    fn test_from_geojson_classifies_structure() {
        let short: GeoscopeError = geojson::Error::PositionTooShort(1).into();
        assert!(matches!(short, GeoscopeError::Geometry(_)));

        let malformed = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        let err: GeoscopeError = geojson::Error::MalformedJson(malformed).into();
        assert!(matches!(err, GeoscopeError::Serialization(_)));
    }
}
