//! Blob store on Cloud Storage (JSON API, simple media upload).

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::sync::Arc;

use super::{BlobError, BlobStore};
use crate::gateway::service_account::{ServiceAccount, TokenError};

const UPLOAD_ROOT: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const PUBLIC_ROOT: &str = "https://storage.googleapis.com";

impl From<TokenError> for BlobError {
    fn from(err: TokenError) -> Self {
        BlobError::Auth(err.to_string())
    }
}

pub struct CloudBlobStore {
    bucket: String,
    auth: Arc<ServiceAccount>,
    http: reqwest::Client,
}

impl CloudBlobStore {
    pub fn new(bucket: &str, auth: Arc<ServiceAccount>, http: reqwest::Client) -> Self {
        Self {
            bucket: bucket.to_string(),
            auth,
            http,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/o",
            UPLOAD_ROOT,
            utf8_percent_encode(&self.bucket, NON_ALPHANUMERIC)
        )
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_ROOT, self.bucket, path)
    }
}

#[async_trait]
impl BlobStore for CloudBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError> {
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(token)
            .query(&[
                ("uploadType", "media"),
                ("name", path),
                ("predefinedAcl", "publicRead"),
            ])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(self.public_url(path))
    }

    fn backend(&self) -> &'static str {
        "cloud"
    }
}
