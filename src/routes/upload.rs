/**
 * Upload Routes
 * Multipart file upload to blob storage for images referenced by content
 */
use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::auth::require_admin;
use crate::blob::{upload_blob, UploadRequest, DEFAULT_NAMESPACE};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub file_name: String,
}

struct FilePart {
    bytes: Bytes,
    file_name: String,
    content_type: Option<String>,
}

/// POST /api/test-upload - Multipart `file` plus an optional `folder`
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    require_admin(&state, &headers).await?;

    let mut file: Option<FilePart> = None;
    let mut folder: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Multipart error: {}", e);
                return Err(ApiError::Validation("Invalid multipart data".to_string()));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::warn!("Failed to read upload bytes: {}", e);
                    ApiError::Validation("Failed to read file data".to_string())
                })?;
                file = Some(FilePart {
                    bytes,
                    file_name,
                    content_type,
                });
            }
            Some("folder") => {
                let text = field.text().await.map_err(|_| {
                    ApiError::Validation("Invalid folder field".to_string())
                })?;
                folder = Some(text);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::Validation("No file provided".to_string()))?;

    let stored = upload_blob(
        state.blobs.as_ref(),
        UploadRequest {
            bytes: file.bytes,
            namespace: folder.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            file_name: file.file_name,
            content_type: file.content_type,
        },
    )
    .await?;

    let file_name = stored
        .path
        .rsplit('/')
        .next()
        .unwrap_or(stored.path.as_str())
        .to_string();

    Ok(Json(UploadResponse {
        success: true,
        url: stored.url,
        file_name,
    }))
}
