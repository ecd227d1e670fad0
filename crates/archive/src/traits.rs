//! Archiver trait and key derivation.

use crate::error::{ArchiveError, ArchiveResult};
use async_trait::async_trait;
use bytes::Bytes;

/// File extension of archived artifacts. Providers only ever hand out PDFs.
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// MIME type of archived artifacts.
pub const ARTIFACT_CONTENT_TYPE: &str = "application/pdf";

/// Location of an archived artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedArtifact {
    /// Backend-relative key (folder plus key hint).
    pub key: String,
    /// Stable public URL stored on the record.
    pub url: String,
}

/// Uploads signed artifacts to durable storage.
///
/// Keys are derived deterministically from the key hint, so archiving the
/// same hint twice overwrites the first artifact instead of creating a second.
#[async_trait]
pub trait ArtifactArchiver: Send + Sync {
    /// Upload `data` under a key derived from `key_hint` and return where it landed.
    async fn archive(&self, data: Bytes, key_hint: &str) -> ArchiveResult<ArchivedArtifact>;

    /// Short backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and writable.
    async fn health_check(&self) -> ArchiveResult<()>;
}

/// Reject hints that could address anything outside the configured folder.
pub fn validate_key_hint(key_hint: &str) -> ArchiveResult<()> {
    if key_hint.is_empty() {
        return Err(ArchiveError::InvalidKey("empty key hint".to_string()));
    }
    if key_hint.starts_with('.')
        || !key_hint
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    {
        return Err(ArchiveError::InvalidKey(format!(
            "key hint must be [A-Za-z0-9._-] and not start with '.': {key_hint}"
        )));
    }
    Ok(())
}

/// Object key for a hint: `<folder>/<hint>.pdf`, or `<hint>.pdf` without a folder.
pub fn object_key(folder: &str, key_hint: &str) -> ArchiveResult<String> {
    validate_key_hint(key_hint)?;
    let folder = folder.trim_matches('/');
    Ok(if folder.is_empty() {
        format!("{key_hint}.{ARTIFACT_EXTENSION}")
    } else {
        format!("{folder}/{key_hint}.{ARTIFACT_EXTENSION}")
    })
}

/// Join a public base URL and an object key with exactly one slash.
pub fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_deterministic() {
        assert_eq!(
            object_key("skribble_signed_docs", "abc-1").unwrap(),
            "skribble_signed_docs/abc-1.pdf"
        );
        assert_eq!(
            object_key("/docs/", "abc-1_cancellation").unwrap(),
            "docs/abc-1_cancellation.pdf"
        );
        assert_eq!(object_key("", "abc").unwrap(), "abc.pdf");
    }

    #[test]
    fn hostile_hints_rejected() {
        for hint in ["", "../etc/passwd", "a/b", ".hidden", "a b"] {
            assert!(
                matches!(object_key("docs", hint), Err(ArchiveError::InvalidKey(_))),
                "{hint:?} should be rejected"
            );
        }
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://cdn.example/", "/a/b.pdf"), "https://cdn.example/a/b.pdf");
        assert_eq!(join_url("https://cdn.example", "a.pdf"), "https://cdn.example/a.pdf");
    }
}
