//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing required fields")]
    MissingFields { fields: Vec<&'static str> },

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid unit kind: {0}")]
    InvalidUnitKind(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
