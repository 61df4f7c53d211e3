//! Object storage for attachments (certificates, spec sheets, product photos).

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use rfqhub_common::error::WorkflowError;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("bucket name must match [a-z0-9-]+")]
    InvalidBucket,

    #[error("path must be relative, without empty or parent segments")]
    InvalidPath,

    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FileError> for WorkflowError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::InvalidBucket => WorkflowError::validation("bucket", err.to_string()),
            FileError::InvalidPath => WorkflowError::validation("path", err.to_string()),
            FileError::Io(e) => WorkflowError::Store(e.to_string()),
        }
    }
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` and return the public URL of the object.
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String, FileError>;
    /// Returns false if there was nothing to remove.
    async fn remove(&self, bucket: &str, path: &str) -> Result<bool, FileError>;
}

/// Files under a root directory, one subdirectory per bucket.
pub struct LocalFileStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, FileError> {
        validate_bucket(bucket)?;
        let relative = validate_path(path)?;
        Ok(self.root.join(bucket).join(relative))
    }
}

pub fn validate_bucket(bucket: &str) -> Result<(), FileError> {
    let ok = !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(FileError::InvalidBucket)
    }
}

pub fn validate_path(path: &str) -> Result<PathBuf, FileError> {
    if path.is_empty() || path.split('/').any(|seg| seg.is_empty()) {
        return Err(FileError::InvalidPath);
    }
    let candidate = Path::new(path);
    if !candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(FileError::InvalidPath);
    }
    Ok(candidate.to_path_buf())
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String, FileError> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(bucket, path, size = bytes.len(), "stored file");
        Ok(format!("{}/files/{bucket}/{path}", self.public_url))
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<bool, FileError> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names_are_restricted() {
        assert!(validate_bucket("certificates").is_ok());
        assert!(validate_bucket("rfq-attachments-2").is_ok());
        assert!(validate_bucket("").is_err());
        assert!(validate_bucket("Certs").is_err());
        assert!(validate_bucket("a/b").is_err());
    }

    #[test]
    fn traversal_and_absolute_paths_rejected() {
        assert!(validate_path("supplier/iso9001.pdf").is_ok());
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("a/../../b").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("a//b").is_err());
        assert!(validate_path("./a").is_err());
        assert!(validate_path("").is_err());
    }

    #[tokio::test]
    async fn upload_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), "http://localhost:3080/");
        let url = storage
            .upload("certificates", "s1/iso9001.pdf", b"%PDF-1.7")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3080/files/certificates/s1/iso9001.pdf");
        let on_disk = std::fs::read(dir.path().join("certificates/s1/iso9001.pdf")).unwrap();
        assert_eq!(on_disk, b"%PDF-1.7");

        assert!(storage.remove("certificates", "s1/iso9001.pdf").await.unwrap());
        assert!(!storage.remove("certificates", "s1/iso9001.pdf").await.unwrap());
    }
}
