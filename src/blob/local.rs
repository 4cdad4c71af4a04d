//! Blob store on the local filesystem, served back under `/uploads`.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

use super::{BlobError, BlobStore};

pub const PUBLIC_PREFIX: &str = "/uploads";

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, _content_type: &str) -> Result<String, BlobError> {
        // Paths come from blob_path; refuse anything that could escape the root.
        if path.split('/').any(|s| s.is_empty() || s == "..") {
            return Err(BlobError::Rejected("Invalid filename".to_string()));
        }

        let file_path = self.root.join(path);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                tracing::error!("Failed to create upload directory: {}", e);
                e
            })?;
        }

        tokio::fs::write(&file_path, &bytes).await.map_err(|e| {
            tracing::error!("Failed to write upload file: {}", e);
            e
        })?;

        Ok(format!("{}/{}", PUBLIC_PREFIX, path))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("site-backend-blobs-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_put_writes_file_and_returns_public_url() {
        let root = temp_root();
        let store = LocalBlobStore::new(&root);

        let url = store
            .put("gallery/1_photo.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(url, "/uploads/gallery/1_photo.jpg");
        let written = tokio::fs::read(root.join("gallery/1_photo.jpg")).await.unwrap();
        assert_eq!(written, b"jpeg");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_put_refuses_traversal() {
        let store = LocalBlobStore::new(temp_root());
        let err = store
            .put("../escape.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Rejected(_)));
    }
}
