//! Reconciliation engine errors.

use sigtrack_archive::ArchiveError;
use sigtrack_provider::ProviderError;
use sigtrack_records::RecordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("record store error: {0}")]
    Records(#[from] RecordError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("invalid reconcile configuration: {0}")]
    Config(String),

    #[error("task queue closed")]
    QueueClosed,
}

impl EngineError {
    /// Label for the check failure metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(e) => e.kind(),
            Self::Records(_) => "records",
            Self::Archive(_) => "archive",
            Self::Config(_) => "config",
            Self::QueueClosed => "queue_closed",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
