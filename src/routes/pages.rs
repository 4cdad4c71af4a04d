/**
 * Public Pages
 * Server-rendered home page and blog. While maintenance mode is on every
 * page answers 503 with the maintenance notice and no content is loaded
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::content::models::{
    HeroSlide, Post, PostStatus, Service, ServiceCategory, SiteConfig, HERO_SLIDES, POSTS,
    SERVICES, SERVICE_CATEGORIES,
};
use crate::error::ApiError;
use crate::render::{self, HomeContent, Page, SiteMeta};
use crate::store::{get_typed, query_typed, Direction, Query};
use crate::AppState;

const BLOG_INDEX_LIMIT: usize = 50;

fn respond(page: Page) -> Response {
    match page {
        Page::Maintenance(html) => (StatusCode::SERVICE_UNAVAILABLE, Html(html)).into_response(),
        Page::Content(html) => Html(html).into_response(),
    }
}

/// The maintenance response, when the site is down.
fn maintenance(config: &SiteConfig, site: &SiteMeta) -> Option<Response> {
    config
        .maintenance_mode
        .then(|| respond(Page::Maintenance(render::maintenance_notice(&site.resolve(config)))))
}

/// GET / - Hero, services, gallery and contact sections
pub async fn home(State(state): State<AppState>) -> Result<Response, ApiError> {
    let config = state.site_config.current().await;
    let site = state.site_meta();
    if let Some(response) = maintenance(&config, &site) {
        return Ok(response);
    }

    let store = state.store()?;
    let slides = query_typed::<HeroSlide>(
        store.as_ref(),
        HERO_SLIDES,
        &Query::new().order_by("order", Direction::Ascending),
    )
    .await
    .map_err(ApiError::store("Failed to load home page"))?;
    let categories = query_typed::<ServiceCategory>(
        store.as_ref(),
        SERVICE_CATEGORIES,
        &Query::new().order_by("createdAt", Direction::Descending),
    )
    .await
    .map_err(ApiError::store("Failed to load home page"))?;
    let services = query_typed::<Service>(
        store.as_ref(),
        SERVICES,
        &Query::new().order_by("title", Direction::Ascending),
    )
    .await
    .map_err(ApiError::store("Failed to load home page"))?;

    let content = HomeContent {
        slides,
        categories,
        services,
    };
    Ok(respond(render::public_page(&config, &site, |site| {
        render::home_page(site, &config, &content)
    })))
}

/// GET /blog - Published posts, newest first
pub async fn blog_index(State(state): State<AppState>) -> Result<Response, ApiError> {
    let config = state.site_config.current().await;
    let site = state.site_meta();
    if let Some(response) = maintenance(&config, &site) {
        return Ok(response);
    }

    let store = state.store()?;
    let query = Query::new()
        .filter("status", PostStatus::Published.as_str())
        .order_by("createdAt", Direction::Descending)
        .limit(BLOG_INDEX_LIMIT);
    let posts = query_typed::<Post>(store.as_ref(), POSTS, &query)
        .await
        .map_err(ApiError::store("Failed to load blog"))?;

    Ok(respond(render::public_page(&config, &site, |site| {
        render::blog_index(site, &posts)
    })))
}

/// GET /blog/{id} - A single published post
pub async fn blog_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let config = state.site_config.current().await;
    let site = state.site_meta();
    if let Some(response) = maintenance(&config, &site) {
        return Ok(response);
    }

    let store = state.store()?;
    let post = get_typed::<Post>(store.as_ref(), POSTS, &id)
        .await
        .map_err(ApiError::store("Failed to load post"))?
        .filter(|post| post.status == PostStatus::Published);

    let Some(post) = post else {
        let html = render::not_found_page(&site.resolve(&config));
        return Ok((StatusCode::NOT_FOUND, Html(html)).into_response());
    };

    Ok(respond(render::public_page(&config, &site, |site| {
        render::post_page(site, &post)
    })))
}

#[cfg(test)]
mod tests {
    use crate::content::models::{HERO_SLIDES, POSTS, SITE_CONFIG, SITE_CONFIG_ID};
    use crate::site_config::CachePhase;
    use crate::store::DocumentStore;
    use crate::test_support::{post_json, put_json, request, send_text, TestApp, ADMIN_TOKEN};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    async fn seed(app: &TestApp, collection: &str, id: &str, doc: Value) {
        app.store
            .set(collection, id, doc.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    async fn seed_post(app: &TestApp, id: &str, status: &str) {
        seed(
            app,
            POSTS,
            id,
            json!({
                "title": format!("Post {}", id),
                "content": "<p>Hello<script>alert(1)</script></p>",
                "status": status,
                "createdAt": "2024-03-01T09:00:00.000Z",
                "updatedAt": "2024-03-01T09:00:00.000Z",
                "readTime": "1 min read"
            }),
        )
        .await;
    }

    async fn page(app: &TestApp, uri: &str) -> (StatusCode, String) {
        send_text(app.router(), request(Method::GET, uri, None, None)).await
    }

    #[tokio::test]
    async fn test_home_renders_slides_from_collection() {
        let app = TestApp::new();
        seed(
            &app,
            HERO_SLIDES,
            "s1",
            json!({ "title": "Welcome aboard", "order": 0 }),
        )
        .await;

        let (status, html) = page(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Welcome aboard"));
        assert!(html.contains("Acme Studio"));
    }

    #[tokio::test]
    async fn test_maintenance_mode_gates_every_page() {
        let app = TestApp::new();
        seed(&app, HERO_SLIDES, "s1", json!({ "title": "Welcome aboard", "order": 0 })).await;
        seed_post(&app, "p1", "published").await;

        let (status, _) = put_json(
            app.router(),
            "/api/config",
            Some(ADMIN_TOKEN),
            &json!({ "maintenanceMode": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        for uri in ["/", "/blog", "/blog/p1", "/blog/missing"] {
            let (status, html) = page(&app, uri).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
            assert!(html.contains("right back"));
            assert!(!html.contains("Welcome aboard"));
            assert!(!html.contains("Post p1"));
        }
    }

    #[tokio::test]
    async fn test_malformed_slides_do_not_lift_maintenance() {
        let app = TestApp::new();
        put_json(
            app.router(),
            "/api/config",
            Some(ADMIN_TOKEN),
            &json!({ "maintenanceMode": true }),
        )
        .await;
        assert_eq!(page(&app, "/").await.0, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = post_json(
            app.router(),
            "/api/config/save",
            Some(ADMIN_TOKEN),
            &json!({ "heroSlides": [{ "title": null, "imageUrl": "https://cdn.test/a.jpg" }] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(page(&app, "/").await.0, StatusCode::SERVICE_UNAVAILABLE);

        // A document written by another client with the same defect.
        app.store
            .merge(
                SITE_CONFIG,
                SITE_CONFIG_ID,
                json!({ "heroSlides": [{ "title": null }, { "order": "x" }] })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        app.state.site_config.invalidate();
        assert_eq!(page(&app, "/").await.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app.state.site_config.phase(), CachePhase::Ready);
    }

    #[tokio::test]
    async fn test_blog_hides_drafts() {
        let app = TestApp::new();
        seed_post(&app, "live", "published").await;
        seed_post(&app, "wip", "draft").await;

        let (status, html) = page(&app, "/blog").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Post live"));
        assert!(!html.contains("Post wip"));

        let (status, _) = page(&app, "/blog/wip").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_page_sanitizes_content() {
        let app = TestApp::new();
        seed_post(&app, "live", "published").await;

        let (status, html) = page(&app, "/blog/live").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Hello"));
        assert!(!html.contains("<script>"));
    }
}
