/**
 * API Errors
 * One error type for every handler, rendered as `{ "error": "..." }`
 */
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::blob::BlobError;
use crate::gateway::{identity::AuthError, GatewayError};
use crate::store::StoreError;

/// Error body shared by every route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }
}

/// Success body for deletes and writes without a payload
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input; nothing was written.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Token rejected by the identity provider.
    #[error(transparent)]
    Auth(AuthError),

    /// The admin data gateway has no connection.
    #[error(transparent)]
    Config(#[from] GatewayError),

    /// Store failure; `context` is what the caller sees.
    #[error("{context}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Upload failed")]
    Upload(#[source] BlobError),
}

impl ApiError {
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Store { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::KeyFetch(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) | ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Config(_) | ApiError::Store { .. } | ApiError::Upload(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unavailable(gateway) => ApiError::Config(gateway),
            other => ApiError::Auth(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Rejected(reason) => ApiError::Validation(reason),
            other => ApiError::Upload(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Config(e) => {
                tracing::error!(error = %e, "admin data gateway unavailable");
                ErrorResponse::new(format!("Server configuration error: {}", e))
            }
            ApiError::Store { context, source } => {
                tracing::error!(error = %source, "{}", context);
                ErrorResponse::new(*context)
            }
            ApiError::Upload(source) => {
                tracing::error!(error = %source, "blob upload failed");
                ErrorResponse::new("Upload failed")
            }
            ApiError::Auth(e @ AuthError::KeyFetch(_)) => {
                tracing::error!(error = %e, "identity provider unreachable");
                ErrorResponse::new("Token verification unavailable")
            }
            ApiError::Auth(e) => {
                tracing::debug!(error = %e, "token verification failed");
                ErrorResponse::new(e.to_string())
            }
            other => ErrorResponse::new(other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Config(GatewayError::NotConfigured("missing".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_hides_details() {
        let err = ApiError::store("Failed to save service")(StoreError::Invalid(
            "secret internals".into(),
        ));
        assert_eq!(err.to_string(), "Failed to save service");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rejected_blob_is_a_validation_error() {
        let err: ApiError = BlobError::Rejected("Empty file".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_identity_provider_is_a_server_error() {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let fetch_error = http.get("http://127.0.0.1:9/keys").send().await.unwrap_err();
        let err: ApiError = AuthError::KeyFetch(fetch_error).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(AuthError::MissingKeyId).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_unavailable_identity_maps_to_config() {
        let err: ApiError =
            AuthError::Unavailable(GatewayError::NotConfigured("no creds".into())).into();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
