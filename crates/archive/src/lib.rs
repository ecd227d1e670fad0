//! Archival of signed artifacts for the signature request tracker.
//!
//! This crate provides:
//! - The [`ArtifactArchiver`] trait with deterministic, overwrite-on-rearchive keys
//! - Backends: local filesystem, S3-compatible, and Cloudinary

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{
    cloudinary::CloudinaryArchiver,
    filesystem::FilesystemArchiver,
    s3::{S3Archiver, S3Settings},
};
pub use error::{ArchiveError, ArchiveResult};
pub use traits::{ArchivedArtifact, ArtifactArchiver, object_key};

use sigtrack_core::config::{ArchiveBackendConfig, ArchiveConfig};
use std::sync::Arc;

/// Create an archiver from configuration.
pub async fn from_config(config: &ArchiveConfig) -> ArchiveResult<Arc<dyn ArtifactArchiver>> {
    config.validate().map_err(ArchiveError::Config)?;

    match &config.backend {
        ArchiveBackendConfig::Filesystem {
            path,
            public_base_url,
        } => {
            let backend =
                FilesystemArchiver::new(path, config.folder.clone(), public_base_url.clone())
                    .await?;
            Ok(Arc::new(backend))
        }
        ArchiveBackendConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
            public_base_url,
        } => {
            let settings = S3Settings {
                bucket: bucket.clone(),
                endpoint: endpoint.clone(),
                region: region.clone(),
                prefix: prefix.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                force_path_style: *force_path_style,
                public_base_url: public_base_url.clone(),
            };
            let backend =
                S3Archiver::new(settings, config.folder.clone(), config.force_inline).await?;
            Ok(Arc::new(backend))
        }
        ArchiveBackendConfig::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
            api_base_url,
        } => {
            let backend = CloudinaryArchiver::new(
                cloud_name.clone(),
                api_key.clone(),
                api_secret.clone(),
                api_base_url.clone(),
                config.folder.clone(),
                config.force_inline,
            )?;
            Ok(Arc::new(backend))
        }
    }
}
