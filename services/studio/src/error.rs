//! services/studio/src/error.rs
//!
//! Defines the startup error type of the studio binaries.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `CORS_ORIGIN` is not a valid header value.
    #[error("Invalid CORS_ORIGIN '{origin}': {reason}")]
    CorsOrigin { origin: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Binding the listener or writing the OpenAPI document failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not serialize the OpenAPI document: {0}")]
    OpenApi(#[from] serde_json::Error),
}
