//! Unified error handling for the place-map library.
//!
//! The pure computations (clustering, classification, heatmap fields, map
//! assembly) never fail: degenerate input produces empty output instead.
//! Errors only arise at the edges: loading data from the upstream provider,
//! parsing configuration, and the FFI boundary.

use thiserror::Error;

/// Unified error type for place-map operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaceMapError {
    /// The visit/route data provider failed
    #[error("Data provider error: {message}")]
    Provider { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A record has unusable coordinates
    #[error("Record '{id}' has invalid coordinates: {message}")]
    InvalidCoordinates { id: String, message: String },

    /// A background load ended without delivering an outcome
    #[error("Load request {generation} ended without a result")]
    LoadAborted { generation: u64 },

    /// JSON encoding/decoding failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlaceMapError {
    /// Shorthand for a provider failure.
    pub fn provider(message: impl Into<String>) -> Self {
        PlaceMapError::Provider {
            message: message.into(),
        }
    }

    /// Shorthand for a configuration failure.
    pub fn config(message: impl Into<String>) -> Self {
        PlaceMapError::ConfigError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PlaceMapError {
    fn from(err: serde_json::Error) -> Self {
        PlaceMapError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for place-map operations.
pub type Result<T> = std::result::Result<T, PlaceMapError>;
