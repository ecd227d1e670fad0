//! Record store abstraction and implementations for tracked signature requests.
//!
//! This crate provides:
//! - The `signature_requests` schema (one row per request, with an optional
//!   cancellation unit)
//! - Worklist queries for the reconciler
//! - Conditional unit updates that make finalization race-safe
//! - Insert notifications (in-process for SQLite, LISTEN/NOTIFY for PostgreSQL)

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{RecordError, RecordResult};
pub use models::{RecordEvent, SignatureRequestRow};
pub use postgres::PostgresStore;
pub use repos::SignatureRequestRepo;
pub use store::{RecordStore, SqliteStore};

use sigtrack_core::config::RecordStoreConfig;
use std::sync::Arc;

/// Create a record store from configuration.
pub async fn from_config(config: &RecordStoreConfig) -> RecordResult<Arc<dyn RecordStore>> {
    config.validate().map_err(RecordError::Config)?;
    match config {
        RecordStoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
        RecordStoreConfig::Postgres {
            url,
            max_connections,
            statement_timeout_ms,
        } => {
            tracing::info!("Connecting to PostgreSQL record store");
            let store = PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("records.db");
        let config = RecordStoreConfig::Sqlite {
            path: db_path.clone(),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_from_config_rejects_empty_postgres_url() {
        let config = RecordStoreConfig::Postgres {
            url: String::new(),
            max_connections: 4,
            statement_timeout_ms: None,
        };
        assert!(matches!(
            from_config(&config).await,
            Err(RecordError::Config(_))
        ));
    }
}
