//! In-memory provider and archiver doubles.

use async_trait::async_trait;
use bytes::Bytes;
use sigtrack_archive::{ArchiveError, ArchiveResult, ArchivedArtifact, ArtifactArchiver};
use sigtrack_provider::{ProviderClient, ProviderError, ProviderResult, StatusPayload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable provider. Unknown ids report no `status_overall`.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockProvider {
    statuses: Mutex<HashMap<String, String>>,
    failing_status: Mutex<Vec<String>>,
    documents: Mutex<HashMap<String, String>>,
    status_delay: Mutex<Option<Duration>>,
    fetch_delay: Mutex<Option<Duration>>,
    fail_lookup: AtomicBool,
    fail_fetch: AtomicBool,
    pub status_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn set_status(&self, id: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), status.to_string());
    }

    /// Make `get_status(id)` fail with a 502.
    pub fn fail_status_for(&self, id: &str) {
        self.failing_status.lock().unwrap().push(id.to_string());
    }

    pub fn map_document(&self, signature_request_id: &str, document_id: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(signature_request_id.to_string(), document_id.to_string());
    }

    pub fn delay_status(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_fetch(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_lookups(&self) {
        self.fail_lookup.store(true, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn get_status(&self, id: &str) -> ProviderResult<StatusPayload> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_status.lock().unwrap().iter().any(|f| f == id) {
            return Err(ProviderError::Status {
                operation: "status lookup",
                status: 502,
            });
        }
        Ok(StatusPayload {
            id: Some(id.to_string()),
            status_overall: self.statuses.lock().unwrap().get(id).cloned(),
            document_id: None,
        })
    }

    async fn resolve_document_id(&self, signature_request_id: &str) -> ProviderResult<String> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                operation: "signature request lookup",
                status: 503,
            });
        }
        self.documents
            .lock()
            .unwrap()
            .get(signature_request_id)
            .cloned()
            .ok_or_else(|| ProviderError::MissingMapping(signature_request_id.to_string()))
    }

    async fn fetch_signed_content(&self, signature_request_id: &str) -> ProviderResult<Bytes> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                operation: "document download",
                status: 500,
            });
        }
        Ok(Bytes::from(format!("%PDF-1.7 {signature_request_id}")))
    }
}

/// Archiver that records every upload.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockArchiver {
    uploads: Mutex<Vec<String>>,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl MockArchiver {
    /// Key hints archived so far, in order.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn url_for(key_hint: &str) -> String {
        format!("https://archive.test/skribble_signed_docs/{key_hint}.pdf")
    }
}

#[async_trait]
impl ArtifactArchiver for MockArchiver {
    async fn archive(&self, _data: Bytes, key_hint: &str) -> ArchiveResult<ArchivedArtifact> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ArchiveError::Rejected {
                status: 500,
                message: "upload failed".to_string(),
            });
        }
        self.uploads.lock().unwrap().push(key_hint.to_string());
        Ok(ArchivedArtifact {
            key: format!("skribble_signed_docs/{key_hint}.pdf"),
            url: Self::url_for(key_hint),
        })
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self) -> ArchiveResult<()> {
        Ok(())
    }
}
