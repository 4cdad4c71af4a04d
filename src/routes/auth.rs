/**
 * Auth Routes
 * Bearer token checks shared by the admin routes, and token verification
 * for the admin UI
 */
use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::gateway::identity::{AuthError, IdentityClaims};
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub admin: bool,
}

impl From<IdentityClaims> for UserInfo {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            admin: claims.admin,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verified claims of the caller, who must hold the admin role.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<IdentityClaims, ApiError> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Authorization required".to_string()))?;

    let claims = state.gateway.verify_token(token).await?;
    if !claims.admin {
        tracing::warn!(uid = %claims.sub, "non-admin caller rejected");
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(claims)
}

/// Claims of the caller when a valid token is present; anonymous otherwise.
pub async fn optional_claims(state: &AppState, headers: &HeaderMap) -> Option<IdentityClaims> {
    let token = extract_bearer_token(headers)?;
    match state.gateway.verify_token(token).await {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("Ignoring unverifiable token on public route: {}", e);
            None
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/auth/verify - Verify the bearer token and return user info
pub async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<VerifyResponse>, ApiError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Ok(Json(VerifyResponse {
            success: false,
            is_valid: false,
            user: None,
            error: Some("No authorization token provided".to_string()),
        }));
    };

    match state.gateway.verify_token(token).await {
        Ok(claims) => Ok(Json(VerifyResponse {
            success: true,
            is_valid: true,
            user: Some(claims.into()),
            error: None,
        })),
        // An unconfigured gateway is a server problem, not a bad token.
        Err(AuthError::Unavailable(e)) => Err(ApiError::Config(e)),
        Err(e @ AuthError::KeyFetch(_)) => Err(e.into()),
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            Ok(Json(VerifyResponse {
                success: false,
                is_valid: false,
                user: None,
                error: Some(e.to_string()),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{get_json, TestApp, ADMIN_TOKEN, USER_TOKEN};
    use axum::http::{HeaderValue, StatusCode};

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers_with("abc")), Some("abc"));
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);

        let mut basic = HeaderMap::new();
        basic.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&basic), None);
    }

    #[tokio::test]
    async fn test_require_admin_statuses() {
        let app = TestApp::new();

        let missing = require_admin(&app.state, &HeaderMap::new()).await.unwrap_err();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let invalid = require_admin(&app.state, &headers_with("bogus")).await.unwrap_err();
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert!(invalid.to_string().contains("Invalid or expired token"));

        let reader = require_admin(&app.state, &headers_with(USER_TOKEN)).await.unwrap_err();
        assert_eq!(reader.status(), StatusCode::FORBIDDEN);

        let admin = require_admin(&app.state, &headers_with(ADMIN_TOKEN)).await.unwrap();
        assert!(admin.admin);
    }

    #[tokio::test]
    async fn test_require_admin_without_gateway_is_server_error() {
        let state = TestApp::unconnected();
        let err = require_admin(&state, &headers_with(ADMIN_TOKEN)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_verify_endpoint() {
        let app = TestApp::new();

        let (status, body) = get_json(app.router(), "/api/auth/verify", Some(ADMIN_TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], true);
        assert_eq!(body["user"]["admin"], true);

        let (status, body) = get_json(app.router(), "/api/auth/verify", Some("bogus")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);

        let (_, body) = get_json(app.router(), "/api/auth/verify", None).await;
        assert_eq!(body["isValid"], false);
        assert!(body["user"].is_null());
    }
}
