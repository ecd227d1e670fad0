//! Common test utilities and fixtures.

use sigtrack_core::{NewSignatureRequest, SigningRequestDraft};
use sigtrack_records::{RecordResult, RecordStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;

#[allow(dead_code)]
/// Environment variable pointing the PostgreSQL tests at a live database.
pub const POSTGRES_URL_ENV: &str = "SIGTRACK_TEST_POSTGRES_URL";

#[allow(dead_code)]
/// A SQLite record store in a temporary directory that cleans up on drop.
pub struct TestRecords {
    pub store: Arc<dyn RecordStore>,
    _temp_dir: TempDir,
}

impl TestRecords {
    pub async fn new() -> RecordResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("records.db")).await?;
        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }
}

/// A validated request for `doc_id`, optionally with a cancellation workflow.
pub fn new_request(doc_id: &str, cancellation_id: Option<&str>) -> NewSignatureRequest {
    SigningRequestDraft {
        user_name: Some("Ada Lovelace".to_string()),
        user_email: Some("ada@example.com".to_string()),
        user_id: Some("user-1".to_string()),
        session_id: Some("sess-1".to_string()),
        application_document_id: Some(doc_id.to_string()),
        signing_url: Some(format!("https://my.skribble.com/view/{doc_id}/sign")),
        is_new_to_switzerland: Some(true),
        document_type: Some("permit".to_string()),
        cancellation_signing_url: cancellation_id
            .map(|id| format!("https://my.skribble.com/view/{id}/sign")),
    }
    .validate()
    .expect("fixture request is valid")
}
