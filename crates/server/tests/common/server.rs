//! Server test utilities.

use super::mocks::{MockArchiver, MockProvider};
use sigtrack_core::config::{AppConfig, RecordStoreConfig};
use sigtrack_records::{RecordStore, SqliteStore};
use sigtrack_server::{AppState, create_router};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub provider: Arc<MockProvider>,
    pub archiver: Arc<MockArchiver>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server backed by a temporary SQLite store.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("records.db");

        let mut config = AppConfig::for_testing();
        config.records = RecordStoreConfig::Sqlite {
            path: db_path.clone(),
        };
        // Generous start rate so tests are not paced by the limiter.
        config.reconcile.max_starts_per_window = 100;
        modifier(&mut config);

        let records: Arc<dyn RecordStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create record store"),
        );
        let provider = Arc::new(MockProvider::default());
        let archiver = Arc::new(MockArchiver::default());

        let state = AppState::new(config, records, provider.clone(), archiver.clone())
            .expect("Failed to build app state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            provider,
            archiver,
            _temp_dir: temp_dir,
        }
    }

    pub fn records(&self) -> Arc<dyn RecordStore> {
        self.state.records.clone()
    }
}
