//! Provider error types.

use thiserror::Error;

/// Provider client errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Login was refused or returned no token.
    #[error("Skribble login error: {0}")]
    Login(String),

    /// An authenticated call was rejected; the cached token has been dropped.
    #[error("provider rejected access token")]
    Unauthorized,

    /// The provider answered with an unexpected status.
    #[error("{operation} failed with status {status}")]
    Status { operation: &'static str, status: u16 },

    /// The signature request has no `document_id` yet.
    #[error("no document_id found for signature request {0}")]
    MissingMapping(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Unauthorized => "unauthorized",
            Self::Status { .. } => "status",
            Self::MissingMapping(_) => "missing_mapping",
            Self::Http(_) => "transport",
            Self::Config(_) => "config",
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
