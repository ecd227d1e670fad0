//! Local filesystem archive backend.

use crate::error::{ArchiveError, ArchiveResult};
use crate::traits::{ArchivedArtifact, ArtifactArchiver, join_url, object_key};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Archives artifacts as files under a root directory.
pub struct FilesystemArchiver {
    root: PathBuf,
    folder: String,
    public_base_url: Option<String>,
}

impl FilesystemArchiver {
    /// Create a new filesystem archiver, creating the root if needed.
    pub async fn new(
        root: impl AsRef<Path>,
        folder: impl Into<String>,
        public_base_url: Option<String>,
    ) -> ArchiveResult<Self> {
        fs::create_dir_all(root.as_ref()).await?;
        // Absolute root so file:// URLs are usable outside the process.
        let root = fs::canonicalize(root.as_ref()).await?;
        Ok(Self {
            root,
            folder: folder.into(),
            public_base_url,
        })
    }

    /// Root directory artifacts are written under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key below the root, refusing anything but plain components.
    fn key_path(&self, key: &str) -> ArchiveResult<PathBuf> {
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(ArchiveError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }
        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(ArchiveError::InvalidKey(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str, path: &Path) -> String {
        match &self.public_base_url {
            Some(base) => join_url(base, key),
            None => format!("file://{}", path.display()),
        }
    }

    /// Write to a uniquely named temp file, fsync, then rename over the target.
    async fn write_atomic(path: &Path, data: &[u8]) -> ArchiveResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactArchiver for FilesystemArchiver {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn archive(&self, data: Bytes, key_hint: &str) -> ArchiveResult<ArchivedArtifact> {
        let key = object_key(&self.folder, key_hint)?;
        let path = self.key_path(&key)?;
        Self::write_atomic(&path, &data).await?;

        let url = self.url_for(&key, &path);
        tracing::debug!(key = %key, url = %url, "archived artifact");
        Ok(ArchivedArtifact { key, url })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> ArchiveResult<()> {
        let marker = self.root.join(".sigtrack-health-check");
        Self::write_atomic(&marker, b"health-check").await?;
        fs::remove_file(&marker).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn archive_writes_under_folder() {
        let temp = tempfile::tempdir().unwrap();
        let archiver = FilesystemArchiver::new(temp.path(), "signed", None)
            .await
            .unwrap();

        let artifact = archiver
            .archive(Bytes::from_static(b"%PDF-1.7"), "doc-1")
            .await
            .unwrap();

        assert_eq!(artifact.key, "signed/doc-1.pdf");
        assert!(artifact.url.starts_with("file://"));
        assert!(artifact.url.ends_with("signed/doc-1.pdf"));
        let written = std::fs::read(archiver.root().join("signed/doc-1.pdf")).unwrap();
        assert_eq!(written, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn rearchive_overwrites_same_key() {
        let temp = tempfile::tempdir().unwrap();
        let archiver = FilesystemArchiver::new(
            temp.path(),
            "signed",
            Some("https://files.example/".to_string()),
        )
        .await
        .unwrap();

        let first = archiver
            .archive(Bytes::from_static(b"one"), "doc-1")
            .await
            .unwrap();
        let second = archiver
            .archive(Bytes::from_static(b"two"), "doc-1")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.url, "https://files.example/signed/doc-1.pdf");
        let dir: Vec<_> = std::fs::read_dir(archiver.root().join("signed"))
            .unwrap()
            .collect();
        assert_eq!(dir.len(), 1);
        assert_eq!(
            std::fs::read(archiver.root().join("signed/doc-1.pdf")).unwrap(),
            b"two"
        );
    }

    #[tokio::test]
    async fn traversal_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let archiver = FilesystemArchiver::new(temp.path(), "../outside", None)
            .await
            .unwrap();
        let err = archiver
            .archive(Bytes::from_static(b"x"), "doc-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn health_check_leaves_no_marker() {
        let temp = tempfile::tempdir().unwrap();
        let archiver = FilesystemArchiver::new(temp.path(), "signed", None)
            .await
            .unwrap();
        archiver.health_check().await.unwrap();
        assert_eq!(std::fs::read_dir(archiver.root()).unwrap().count(), 0);
    }
}
