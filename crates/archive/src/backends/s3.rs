//! S3-compatible archive backend using the AWS SDK.

use crate::error::{ArchiveError, ArchiveResult};
use crate::traits::{
    ARTIFACT_CONTENT_TYPE, ArchivedArtifact, ArtifactArchiver, join_url, object_key,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use std::time::Duration;
use tracing::instrument;

fn map_s3_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> ArchiveError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ArchiveError::S3(Box::new(err))
}

/// Connection settings for [`S3Archiver`].
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub prefix: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Use path-style URLs (`endpoint/bucket/key`). Required for MinIO.
    pub force_path_style: bool,
    /// Public base URL (CDN or bucket website) for artifact URLs.
    pub public_base_url: Option<String>,
}

/// Archives artifacts as S3 objects.
pub struct S3Archiver {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    folder: String,
    force_inline: bool,
    /// Base URL objects are reachable under, without a trailing slash.
    url_base: String,
}

impl std::fmt::Debug for S3Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Archiver")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("folder", &self.folder)
            .field("url_base", &self.url_base)
            .finish_non_exhaustive()
    }
}

impl S3Archiver {
    /// Create a new S3 archiver.
    ///
    /// Without explicit credentials the ambient AWS credential chain is used.
    pub async fn new(
        settings: S3Settings,
        folder: impl Into<String>,
        force_inline: bool,
    ) -> ArchiveResult<Self> {
        let S3Settings {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
            public_base_url,
        } = settings;

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let mut builder = match (access_key_id, secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials = aws_sdk_s3::config::Credentials::new(
                    key_id,
                    secret,
                    None,
                    None,
                    "sigtrack-config",
                );
                aws_sdk_s3::config::Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(aws_config::Region::new(resolved_region.clone()))
                    .credentials_provider(credentials)
            }
            (None, None) => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(aws_config::Region::new(resolved_region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
            _ => {
                return Err(ArchiveError::Config(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ));
            }
        };

        // Bare host:port endpoints (e.g. "minio:9000") are plain HTTP.
        let normalized_endpoint = endpoint.as_ref().map(|endpoint_url| {
            let lower = endpoint_url.to_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint_url.trim_end_matches('/').to_string()
            } else {
                format!("http://{}", endpoint_url.trim_end_matches('/'))
            }
        });

        if let Some(endpoint_url) = &normalized_endpoint {
            builder = builder.endpoint_url(endpoint_url);
            if endpoint_url.to_ascii_lowercase().starts_with("http://") {
                builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }
        if force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        let url_base = match (public_base_url, &normalized_endpoint) {
            (Some(base), _) => base.trim_end_matches('/').to_string(),
            (None, Some(endpoint)) => format!("{endpoint}/{bucket}"),
            (None, None) => format!("https://{bucket}.s3.{resolved_region}.amazonaws.com"),
        };

        Ok(Self {
            client,
            bucket,
            prefix: prefix.map(|p| p.trim_end_matches('/').to_string()),
            folder: folder.into(),
            force_inline,
            url_base,
        })
    }

    /// Full object key for a key (applies prefix if configured).
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }

    fn content_disposition(&self, key_hint: &str) -> String {
        if self.force_inline {
            "inline".to_string()
        } else {
            format!("attachment; filename=\"{key_hint}.pdf\"")
        }
    }

    /// Public URL for an object key.
    pub fn url_for(&self, key: &str) -> String {
        join_url(&self.url_base, &self.full_key(key))
    }
}

#[async_trait]
impl ArtifactArchiver for S3Archiver {
    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn archive(&self, data: Bytes, key_hint: &str) -> ArchiveResult<ArchivedArtifact> {
        let key = object_key(&self.folder, key_hint)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(&key))
            .content_type(ARTIFACT_CONTENT_TYPE)
            .content_disposition(self.content_disposition(key_hint))
            .body(data.into())
            .send()
            .await
            .map_err(map_s3_error)?;

        let url = self.url_for(&key);
        tracing::debug!(key = %key, url = %url, "archived artifact");
        Ok(ArchivedArtifact { key, url })
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> ArchiveResult<()> {
        const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

        let check = async {
            self.client
                .head_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(map_s3_error)?;
            Ok(())
        };

        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check)
            .await
            .map_err(|_| {
                ArchiveError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "S3 health check timed out after 10 seconds",
                ))
            })?
    }
}
