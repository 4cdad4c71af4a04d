/**
 * Service Category Routes
 * Groupings for the services section. Updates merge into the stored document
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::auth::require_admin;
use super::{with_id, Changes, SuccessResponse};
use crate::content::models::{ServiceCategory, SERVICE_CATEGORIES};
use crate::content::{now, timestamp_value};
use crate::error::ApiError;
use crate::store::{query_typed, Direction, Query};
use crate::AppState;

pub const LIST_CACHE_CONTROL: &str = "public, s-maxage=60, stale-while-revalidate=60";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
}

impl CategoryRequest {
    fn changes(&self) -> Result<Changes, ApiError> {
        let mut changes = Changes::new();
        changes
            .required("title", "Title", self.title.as_deref())?
            .text("subtitle", self.subtitle.as_deref())
            .image("imageUrl", self.image_url.as_deref())?;
        Ok(changes)
    }
}

/// GET /api/categories - Newest first, cacheable at the edge
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store()?;
    let query = Query::new().order_by("createdAt", Direction::Descending);
    let categories = query_typed::<ServiceCategory>(store.as_ref(), SERVICE_CATEGORIES, &query)
        .await
        .map_err(ApiError::store("Failed to fetch categories"))?;

    Ok(([(header::CACHE_CONTROL, LIST_CACHE_CONTROL)], Json(categories)))
}

/// POST /api/service-categories
pub async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let mut changes = req.changes()?;
    let timestamp = timestamp_value(&now());
    changes
        .set("createdAt", timestamp.clone())
        .set("updatedAt", timestamp);
    let fields = changes.into_document();

    let store = state.store()?;
    let id = store
        .add(SERVICE_CATEGORIES, fields.clone())
        .await
        .map_err(ApiError::store("Failed to create category"))?;

    tracing::info!(category_id = %id, "Service category created");
    Ok(Json(with_id(&id, fields)))
}

/// PUT /api/service-categories/{id} - Merge the given fields
pub async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let mut changes = req.changes()?;
    changes.set("updatedAt", timestamp_value(&now()));
    let fields = changes.into_document();

    let store = state.store()?;
    store
        .merge(SERVICE_CATEGORIES, &id, fields.clone())
        .await
        .map_err(ApiError::store("Failed to update category"))?;

    tracing::info!(category_id = %id, "Service category updated");
    Ok(Json(with_id(&id, fields)))
}

/// DELETE /api/service-categories/{id}
pub async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&state, &headers).await?;
    let store = state.store()?;
    store
        .delete(SERVICE_CATEGORIES, &id)
        .await
        .map_err(ApiError::store("Failed to delete category"))?;

    tracing::info!(category_id = %id, "Service category deleted");
    Ok(SuccessResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentStore;
    use crate::test_support::{delete, post_json, put_json, request, send_json, TestApp, ADMIN_TOKEN};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    async fn create(app: &TestApp, title: &str) -> String {
        let (status, body) = post_json(
            app.router(),
            "/api/service-categories",
            Some(ADMIN_TOKEN),
            &json!({ "title": title, "subtitle": "Sub" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], title);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let app = TestApp::new();
        let id = create(&app, "Design").await;
        let uri = format!("/api/service-categories/{}", id);
        let body = json!({ "title": "Branding", "imageUrl": "https://cdn.test/b.png" });

        let (status, first) = put_json(app.router(), &uri, Some(ADMIN_TOKEN), &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["id"], id.as_str());
        let mut after_first = app.store.get(SERVICE_CATEGORIES, &id).await.unwrap().unwrap();

        let (status, _) = put_json(app.router(), &uri, Some(ADMIN_TOKEN), &body).await;
        assert_eq!(status, StatusCode::OK);
        let mut after_second = app.store.get(SERVICE_CATEGORIES, &id).await.unwrap().unwrap();

        after_first.remove("updatedAt");
        after_second.remove("updatedAt");
        assert_eq!(after_first, after_second);
        // Merge keeps fields the update did not name.
        assert_eq!(after_second["subtitle"], "Sub");
        assert_eq!(after_second["title"], "Branding");
    }

    #[tokio::test]
    async fn test_update_requires_title() {
        let app = TestApp::new();
        let id = create(&app, "Design").await;
        let writes = app.store.write_count();

        let (status, body) = put_json(
            app.router(),
            &format!("/api/service-categories/{}", id),
            Some(ADMIN_TOKEN),
            &json!({ "subtitle": "only" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");
        assert_eq!(app.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_inline_image_is_rejected() {
        let app = TestApp::new();
        let (status, _) = post_json(
            app.router(),
            "/api/service-categories",
            Some(ADMIN_TOKEN),
            &json!({ "title": "T", "imageUrl": "data:image/png;base64,AAAA" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_inline_image() {
        let app = TestApp::new();
        let id = create(&app, "Design").await;
        let writes = app.store.write_count();

        let (status, _) = put_json(
            app.router(),
            &format!("/api/service-categories/{}", id),
            Some(ADMIN_TOKEN),
            &json!({ "title": "Design", "imageUrl": "data:image/png;base64,AAAA" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_with_cache_header() {
        let app = TestApp::new();
        for (id, created) in [("old", "2024-01-01T00:00:00.000Z"), ("new", "2024-06-01T00:00:00.000Z")] {
            app.store
                .set(
                    SERVICE_CATEGORIES,
                    id,
                    json!({ "title": id, "createdAt": created }).as_object().cloned().unwrap(),
                )
                .await
                .unwrap();
        }

        let res = app
            .router()
            .oneshot(request(Method::GET, "/api/categories", None, None))
            .await
            .unwrap();
        assert_eq!(
            res.headers().get(header::CACHE_CONTROL).unwrap(),
            LIST_CACHE_CONTROL
        );

        let (_, list) = send_json(app.router(), request(Method::GET, "/api/categories", None, None)).await;
        assert_eq!(list[0]["id"], "new");
        assert_eq!(list[1]["id"], "old");
    }

    #[tokio::test]
    async fn test_delete_is_unconditional() {
        let app = TestApp::new();
        let (status, body) = delete(app.router(), "/api/service-categories/gone", Some(ADMIN_TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }
}
