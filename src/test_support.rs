//! Shared fixtures for handler tests: an in-memory store, a temp-dir blob
//! store and a fixed token table standing in for the identity provider.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tower::ServiceExt;

use crate::{
    blob::LocalBlobStore,
    config::ServerConfig,
    create_app,
    gateway::{
        identity::{AuthError, IdentityClaims, IdentityVerifier},
        AdminGateway, Connection,
    },
    store::MemoryStore,
    AppState,
};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const USER_TOKEN: &str = "user-token";

/// Identity verifier backed by a fixed token table.
pub struct StaticIdentity {
    tokens: HashMap<String, IdentityClaims>,
}

impl StaticIdentity {
    pub fn claims(sub: &str, admin: bool) -> IdentityClaims {
        IdentityClaims {
            sub: sub.to_string(),
            email: Some(format!("{}@example.com", sub)),
            admin,
            exp: 0,
            iat: 0,
        }
    }
}

impl Default for StaticIdentity {
    fn default() -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(ADMIN_TOKEN.to_string(), Self::claims("admin", true));
        tokens.insert(USER_TOKEN.to_string(), Self::claims("reader", false));
        Self { tokens }
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentity {
    async fn verify_token(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        self.tokens.get(token).cloned().ok_or_else(|| {
            AuthError::InvalidToken(jsonwebtoken::errors::ErrorKind::InvalidToken.into())
        })
    }
}

/// A connected application over in-memory backends.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub upload_dir: PathBuf,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(AdminGateway::with_connection(Connection::new(
            store.clone(),
            Arc::new(StaticIdentity::default()),
        )));

        let upload_dir =
            std::env::temp_dir().join(format!("site-backend-test-{}", uuid::Uuid::new_v4()));
        let config = ServerConfig {
            upload_dir: upload_dir.clone(),
            site_name: "Acme Studio".to_string(),
            site_url: "https://acme.test".to_string(),
            ..ServerConfig::default()
        };

        let state = AppState::new(
            gateway,
            Arc::new(LocalBlobStore::new(upload_dir.clone())),
            config,
        );

        Self {
            state,
            store,
            upload_dir,
        }
    }

    /// An application whose gateway never connected.
    pub fn unconnected() -> AppState {
        AppState::new(
            Arc::new(AdminGateway::new()),
            Arc::new(LocalBlobStore::new(std::env::temp_dir())),
            ServerConfig::default(),
        )
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and read the body as raw text.
pub async fn send_text(app: Router, req: Request<Body>) -> (StatusCode, String) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

/// Send a request and parse the body as JSON (`Null` when empty).
pub async fn send_json(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, text) = send_text(app, req).await;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, value)
}

pub async fn get_json(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send_json(app, request(Method::GET, uri, token, None)).await
}

pub async fn post_json(app: Router, uri: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
    send_json(app, request(Method::POST, uri, token, Some(body))).await
}

pub async fn put_json(app: Router, uri: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
    send_json(app, request(Method::PUT, uri, token, Some(body))).await
}

pub async fn delete(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send_json(app, request(Method::DELETE, uri, token, None)).await
}
