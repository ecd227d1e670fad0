//! Record store error types.

use thiserror::Error;

/// Record store operation errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid state transition: {unit} unit -> {to}")]
    InvalidStateTransition { unit: String, to: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for record store operations.
pub type RecordResult<T> = std::result::Result<T, RecordError>;
