//! Site Backend - content API, admin routes and public pages for a small
//! business website

pub mod blob;
pub mod config;
pub mod content;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod render;
pub mod routes;
pub mod site_config;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};

use blob::{BlobStore, CloudBlobStore, LocalBlobStore};
use config::ServerConfig;
use error::ApiError;
use gateway::AdminGateway;
use render::SiteMeta;
use site_config::SiteConfigCache;
use store::DocumentStore;

/// Shared handles, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AdminGateway>,
    pub blobs: Arc<dyn BlobStore>,
    pub site_config: Arc<SiteConfigCache>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(gateway: Arc<AdminGateway>, blobs: Arc<dyn BlobStore>, config: ServerConfig) -> Self {
        let site_config = Arc::new(SiteConfigCache::new(
            gateway.clone(),
            config.config_cache_ttl,
        ));
        Self {
            gateway,
            blobs,
            site_config,
            config: Arc::new(config),
        }
    }

    /// The document store, or a configuration error when the gateway never
    /// connected.
    pub fn store(&self) -> Result<Arc<dyn DocumentStore>, ApiError> {
        Ok(self.gateway.store()?)
    }

    pub fn site_meta(&self) -> SiteMeta {
        SiteMeta {
            name: self.config.site_name.clone(),
            description: self.config.site_description.clone(),
        }
    }
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local admin UI origins.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Requests running past `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    let config = state.config.clone();

    Router::new()
        // Posts
        .route("/api/posts", get(routes::posts::list_posts))
        .route("/api/posts/create", post(routes::posts::create_post))
        .route(
            "/api/posts/{id}",
            get(routes::posts::get_post)
                .put(routes::posts::update_post)
                .delete(routes::posts::delete_post),
        )
        .route("/api/posts/{id}/view", post(routes::posts::record_view))
        // Service categories
        .route("/api/categories", get(routes::categories::list_categories))
        .route(
            "/api/service-categories",
            post(routes::categories::create_category),
        )
        .route(
            "/api/service-categories/{id}",
            put(routes::categories::update_category).delete(routes::categories::delete_category),
        )
        // Services
        .route(
            "/api/services",
            get(routes::services::list_services).post(routes::services::create_service),
        )
        .route(
            "/api/services/{id}",
            put(routes::services::update_service).delete(routes::services::delete_service),
        )
        // Hero slides
        .route(
            "/api/slides",
            get(routes::slides::list_slides).post(routes::slides::create_slide),
        )
        .route(
            "/api/slides/{id}",
            put(routes::slides::update_slide).delete(routes::slides::delete_slide),
        )
        // Site configuration
        .route("/api/config/get", get(routes::site_config::get_config))
        .route("/api/config/save", post(routes::site_config::save_hero_slides))
        .route("/api/config", put(routes::site_config::update_config))
        // Uploads and auth
        .route("/api/test-upload", post(routes::upload::upload_file))
        .route("/api/auth/verify", get(routes::auth::verify_token))
        // Public pages
        .route("/", get(routes::pages::home))
        .route("/blog", get(routes::pages::blog_index))
        .route("/blog/{id}", get(routes::pages::blog_post))
        .route("/rss.xml", get(routes::rss::rss_feed))
        // Health
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(timeout_layer(config.request_timeout))
        .layer(CompressionLayer::new())
        // Multipart uploads need more than axum's 2 MB extractor default
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(cors)
}

/// Cloud Storage when a bucket is configured and the gateway holds a
/// service account, local disk otherwise.
fn blob_store(config: &ServerConfig, gateway: &AdminGateway) -> Arc<dyn BlobStore> {
    if let Some(bucket) = &config.storage_bucket {
        match (gateway.service_account(), reqwest::Client::builder().timeout(config.request_timeout).build()) {
            (Some(account), Ok(http)) => {
                tracing::info!(bucket = %bucket, "Uploads go to cloud storage");
                return Arc::new(CloudBlobStore::new(bucket, account, http));
            }
            (None, _) => tracing::warn!(
                "STORAGE_BUCKET is set but the admin data gateway has no service account. Falling back to local uploads."
            ),
            (_, Err(e)) => tracing::warn!(
                "Failed to build storage client: {}. Falling back to local uploads.",
                e
            ),
        }
    }

    tracing::info!(dir = %config.upload_dir.display(), "Uploads go to local disk");
    Arc::new(LocalBlobStore::new(config.upload_dir.clone()))
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let logging_config = logging::LoggingConfig::from_env();
    let _log_guards = logging::init(&logging_config);

    routes::health::init_start_time();

    let config = ServerConfig::from_env();

    // Missing credentials leave the gateway unconnected; admin routes then
    // answer with a configuration error instead of the process exiting.
    let gateway = Arc::new(AdminGateway::new());
    gateway.connect().await;

    let blobs = blob_store(&config, &gateway);
    let addr: SocketAddr = config
        .bind_addr()
        .expect("Invalid HOST/PORT configuration");

    let app = create_app(AppState::new(gateway, blobs, config));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestApp;

    #[test]
    fn test_create_app_returns_router() {
        let app = TestApp::new();
        let _router = create_app(app.state.clone());
    }

    #[test]
    fn test_blob_store_defaults_to_local() {
        let gateway = AdminGateway::new();
        let config = ServerConfig {
            storage_bucket: Some("bucket".to_string()),
            ..ServerConfig::default()
        };
        assert_eq!(blob_store(&config, &gateway).backend(), "local");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_requests_time_out_with_408() {
        use axum::body::Body;
        use tower::ServiceExt;

        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }),
            )
            .layer(timeout_layer(Duration::from_secs(1)));

        let res = app
            .oneshot(
                axum::http::Request::get("/slow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_unconnected_gateway_reports_configuration_error() {
        let state = AppState::new(
            Arc::new(AdminGateway::new()),
            Arc::new(LocalBlobStore::new(std::env::temp_dir())),
            ServerConfig::default(),
        );
        let err = state.store().err().expect("store should be unavailable");
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("not configured"));
    }
}
