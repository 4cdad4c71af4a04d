/*!
 * Blob Upload Adapter
 * Validates uploaded files and hands them to object storage, returning a
 * public URL
 */
pub mod cloud;
pub mod local;

use async_trait::async_trait;
use bytes::Bytes;

pub use cloud::CloudBlobStore;
pub use local::LocalBlobStore;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024; // 5MB
pub const DEFAULT_NAMESPACE: &str = "uploads";

const DEFAULT_FILE_NAME: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The payload was refused before any storage call.
    #[error("{0}")]
    Rejected(String),

    #[error("failed to write blob: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob storage returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("authentication with blob storage failed: {0}")]
    Auth(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return the public URL.
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError>;

    fn backend(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub namespace: String,
    pub file_name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub path: String,
}

/// Validate an upload, derive its storage path and store it.
pub async fn upload_blob(
    store: &dyn BlobStore,
    request: UploadRequest,
) -> Result<StoredBlob, BlobError> {
    validate_payload(&request.bytes)?;

    let path = blob_path(
        &request.namespace,
        &request.file_name,
        chrono::Utc::now().timestamp_millis(),
    );
    let content_type = request
        .content_type
        .as_deref()
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let size = request.bytes.len();
    let url = store.put(&path, request.bytes, content_type).await?;
    tracing::info!(backend = store.backend(), path = %path, size, "Blob uploaded");

    Ok(StoredBlob { url, path })
}

fn validate_payload(bytes: &[u8]) -> Result<(), BlobError> {
    if bytes.is_empty() {
        return Err(BlobError::Rejected("Empty file".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(BlobError::Rejected(
            "File too large. Maximum size is 5MB.".to_string(),
        ));
    }
    let head = &bytes[..bytes.len().min(crate::content::INLINE_DATA_PREFIX.len())];
    if head.eq_ignore_ascii_case(crate::content::INLINE_DATA_PREFIX.as_bytes()) {
        return Err(BlobError::Rejected(
            "Inline data URLs are not accepted. Upload the file itself.".to_string(),
        ));
    }
    Ok(())
}

/// `{namespace}/{unix_millis}_{name}` with every segment sanitized.
pub fn blob_path(namespace: &str, file_name: &str, millis: i64) -> String {
    let namespace = sanitize_namespace(namespace);
    let name = sanitize_file_name(file_name);
    format!("{}/{}_{}", namespace, millis, name)
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Last path component only, restricted to `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = sanitize_segment(base.trim());
    if cleaned.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

pub fn sanitize_namespace(namespace: &str) -> String {
    let segments: Vec<String> = namespace
        .split(['/', '\\'])
        .map(|s| sanitize_segment(s.trim()))
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        DEFAULT_NAMESPACE.to_string()
    } else {
        segments.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        puts: Mutex<Vec<(String, usize, String)>>,
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        async fn put(
            &self,
            path: &str,
            bytes: Bytes,
            content_type: &str,
        ) -> Result<String, BlobError> {
            self.puts
                .lock()
                .unwrap()
                .push((path.to_string(), bytes.len(), content_type.to_string()));
            Ok(format!("https://blobs.test/{}", path))
        }

        fn backend(&self) -> &'static str {
            "recording"
        }
    }

    fn request(bytes: &'static [u8]) -> UploadRequest {
        UploadRequest {
            bytes: Bytes::from_static(bytes),
            namespace: "slides".to_string(),
            file_name: "hero image.png".to_string(),
            content_type: Some("image/png".to_string()),
        }
    }

    #[test]
    fn test_blob_path_shape() {
        assert_eq!(
            blob_path("gallery", "photo.jpg", 1_700_000_000_000),
            "gallery/1700000000000_photo.jpg"
        );
    }

    #[test]
    fn test_sanitize_blocks_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..\\secret.txt"), "secret.txt");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_namespace("../posts/./covers"), "posts/covers");
        assert_eq!(sanitize_namespace("  "), DEFAULT_NAMESPACE);
    }

    #[tokio::test]
    async fn test_upload_stores_under_namespace() {
        let store = RecordingStore::default();
        let stored = upload_blob(&store, request(b"\x89PNG....")).await.unwrap();

        assert!(stored.path.starts_with("slides/"));
        assert!(stored.path.ends_with("_hero_image.png"));
        assert_eq!(stored.url, format!("https://blobs.test/{}", stored.path));

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].2, "image/png");
    }

    #[tokio::test]
    async fn test_upload_rejections_do_not_touch_storage() {
        let store = RecordingStore::default();

        let empty = upload_blob(&store, request(b"")).await.unwrap_err();
        assert_eq!(empty.to_string(), "Empty file");

        let inline = upload_blob(&store, request(b"data:image/png;base64,AAAA"))
            .await
            .unwrap_err();
        assert!(matches!(inline, BlobError::Rejected(_)));

        let mut big = request(b"");
        big.bytes = Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert!(matches!(
            upload_blob(&store, big).await,
            Err(BlobError::Rejected(_))
        ));

        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_at_size_limit_is_accepted() {
        let store = RecordingStore::default();
        let mut exact = request(b"");
        exact.bytes = Bytes::from(vec![1u8; MAX_UPLOAD_BYTES]);
        exact.content_type = None;
        upload_blob(&store, exact).await.unwrap();
        assert_eq!(store.puts.lock().unwrap()[0].2, DEFAULT_CONTENT_TYPE);
    }
}
