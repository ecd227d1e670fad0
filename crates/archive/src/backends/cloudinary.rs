//! Cloudinary archive backend.
//!
//! Uploads go through the signed upload API. Artifacts are stored with a fixed
//! public id inside the configured folder and `overwrite=true`, so re-archiving
//! replaces the previous asset.

use crate::error::{ArchiveError, ArchiveResult};
use crate::traits::{ARTIFACT_CONTENT_TYPE, ArchivedArtifact, ArtifactArchiver, validate_key_hint};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// Delivery URL segment that marks an upload.
const UPLOAD_SEGMENT: &str = "/upload/";

/// Replacement that makes browsers open the PDF inline.
const INLINE_UPLOAD_SEGMENT: &str = "/upload/fl_attachment:false/";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Sign upload parameters: sort by name, join as `k=v` with `&`, append the
/// API secret and hash with SHA-256.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Rewrite a delivery URL so the asset is displayed inline.
pub fn inline_delivery_url(url: &str) -> String {
    url.replacen(UPLOAD_SEGMENT, INLINE_UPLOAD_SEGMENT, 1)
}

/// Archives artifacts to Cloudinary.
pub struct CloudinaryArchiver {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    api_base_url: String,
    folder: String,
    force_inline: bool,
}

impl std::fmt::Debug for CloudinaryArchiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryArchiver")
            .field("cloud_name", &self.cloud_name)
            .field("api_base_url", &self.api_base_url)
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

impl CloudinaryArchiver {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        api_base_url: impl Into<String>,
        folder: impl Into<String>,
        force_inline: bool,
    ) -> ArchiveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            folder: folder.into().trim_matches('/').to_string(),
            force_inline,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/auto/upload", self.api_base_url, self.cloud_name)
    }

    /// Parameters covered by the upload signature.
    fn signed_params(&self, public_id: &str, timestamp: i64) -> Vec<(&'static str, String)> {
        vec![
            ("folder", self.folder.clone()),
            ("overwrite", "true".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.to_string()),
            ("unique_filename", "false".to_string()),
            ("use_filename", "true".to_string()),
        ]
    }

    async fn rejection(response: reqwest::Response) -> ArchiveError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => "unreadable error response".to_string(),
        };
        ArchiveError::Rejected { status, message }
    }
}

#[async_trait]
impl ArtifactArchiver for CloudinaryArchiver {
    #[instrument(skip(self, data), fields(backend = "cloudinary", size = data.len()))]
    async fn archive(&self, data: Bytes, key_hint: &str) -> ArchiveResult<ArchivedArtifact> {
        validate_key_hint(key_hint)?;
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let params = self.signed_params(key_hint, timestamp);
        let signature = sign_params(&params, &self.api_secret);

        let file = Part::bytes(data.to_vec())
            .file_name(format!("{key_hint}.pdf"))
            .mime_str(ARTIFACT_CONTENT_TYPE)?;
        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (name, value) in params {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let uploaded: UploadResponse = response.json().await?;
        let url = if self.force_inline {
            inline_delivery_url(&uploaded.secure_url)
        } else {
            uploaded.secure_url
        };
        tracing::debug!(public_id = %uploaded.public_id, url = %url, "archived artifact");
        Ok(ArchivedArtifact {
            key: uploaded.public_id,
            url,
        })
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }

    #[instrument(skip(self), fields(backend = "cloudinary"))]
    async fn health_check(&self) -> ArchiveResult<()> {
        let response = self
            .client
            .get(format!("{}/v1_1/{}/ping", self.api_base_url, self.cloud_name))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_sorted_params() {
        let params = vec![
            ("use_filename", "true".to_string()),
            ("timestamp", "1700000000".to_string()),
            ("public_id", "doc-1".to_string()),
            ("folder", "skribble_signed_docs".to_string()),
            ("unique_filename", "false".to_string()),
            ("overwrite", "true".to_string()),
        ];
        assert_eq!(
            sign_params(&params, "secret"),
            "9340621815298729274c1427fd140935dcc9c191f9e35b7b2049abf2f571b09a"
        );
    }

    #[test]
    fn inline_rewrite_only_touches_upload_segment() {
        assert_eq!(
            inline_delivery_url(
                "https://res.cloudinary.com/demo/image/upload/v1/skribble_signed_docs/doc-1.pdf"
            ),
            "https://res.cloudinary.com/demo/image/upload/fl_attachment:false/v1/skribble_signed_docs/doc-1.pdf"
        );
        assert_eq!(inline_delivery_url("https://x/raw/doc.pdf"), "https://x/raw/doc.pdf");
    }
}
