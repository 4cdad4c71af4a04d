/**
 * Hero Slide Routes
 * Carousel slides, displayed by ascending `order`
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::auth::require_admin;
use super::{with_id, Changes, SuccessResponse};
use crate::content::models::{HeroSlide, DEFAULT_CTA_HREF, DEFAULT_CTA_LABEL, HERO_SLIDES};
use crate::content::{now, optional_text, reject_inline_image, timestamp_value};
use crate::error::ApiError;
use crate::store::{query_typed, Direction, DocumentStore, Query};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRequest {
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub cta_label: Option<String>,
    pub cta_href: Option<String>,
    pub order: Option<i64>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Slide not found".to_string())
}

/// Order for a new slide: one past the highest existing order, 0 when the
/// collection is empty.
async fn next_order(store: &dyn DocumentStore) -> Result<i64, ApiError> {
    let query = Query::new().order_by("order", Direction::Descending).limit(1);
    let last = store
        .query(HERO_SLIDES, &query)
        .await
        .map_err(ApiError::store("Failed to create slide"))?;

    Ok(last
        .first()
        .and_then(|doc| doc.data.get("order"))
        .and_then(Value::as_i64)
        .map(|max| max + 1)
        .unwrap_or(0))
}

/// GET /api/slides - In display order
pub async fn list_slides(State(state): State<AppState>) -> Result<Json<Vec<HeroSlide>>, ApiError> {
    let store = state.store()?;
    let query = Query::new().order_by("order", Direction::Ascending);
    let slides = query_typed::<HeroSlide>(store.as_ref(), HERO_SLIDES, &query)
        .await
        .map_err(ApiError::store("Failed to fetch slides"))?;
    Ok(Json(slides))
}

/// POST /api/slides
pub async fn create_slide(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SlideRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;
    reject_inline_image(req.image_url.as_deref(), "imageUrl")?;

    let store = state.store()?;
    let order = match req.order {
        Some(order) => order,
        None => next_order(store.as_ref()).await?,
    };

    let timestamp = timestamp_value(&now());
    let mut changes = Changes::new();
    changes
        .set("imageUrl", optional_text(req.image_url.as_deref()).unwrap_or_default())
        .set("title", optional_text(req.title.as_deref()).unwrap_or_default())
        .set("subtitle", optional_text(req.subtitle.as_deref()).unwrap_or_default())
        .set(
            "ctaLabel",
            optional_text(req.cta_label.as_deref()).unwrap_or_else(|| DEFAULT_CTA_LABEL.to_string()),
        )
        .set(
            "ctaHref",
            optional_text(req.cta_href.as_deref()).unwrap_or_else(|| DEFAULT_CTA_HREF.to_string()),
        )
        .set("order", order)
        .set("createdAt", timestamp.clone())
        .set("updatedAt", timestamp);
    let fields = changes.into_document();

    let id = store
        .add(HERO_SLIDES, fields.clone())
        .await
        .map_err(ApiError::store("Failed to create slide"))?;

    tracing::info!(slide_id = %id, order, "Hero slide created");
    Ok(Json(with_id(&id, fields)))
}

/// PUT /api/slides/{id} - Merge the given fields into an existing slide
pub async fn update_slide(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<SlideRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let mut changes = Changes::new();
    changes
        .image("imageUrl", req.image_url.as_deref())?
        .text("title", req.title.as_deref())
        .text("subtitle", req.subtitle.as_deref())
        .text("ctaLabel", req.cta_label.as_deref())
        .text("ctaHref", req.cta_href.as_deref());
    if let Some(order) = req.order {
        changes.set("order", order);
    }
    changes.set("updatedAt", timestamp_value(&now()));

    let store = state.store()?;
    let existing = store
        .get(HERO_SLIDES, &id)
        .await
        .map_err(ApiError::store("Failed to update slide"))?;
    if existing.is_none() {
        return Err(not_found());
    }

    let fields = changes.into_document();
    store
        .merge(HERO_SLIDES, &id, fields.clone())
        .await
        .map_err(ApiError::store("Failed to update slide"))?;

    tracing::info!(slide_id = %id, "Hero slide updated");
    Ok(Json(with_id(&id, fields)))
}

/// DELETE /api/slides/{id}
pub async fn delete_slide(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&state, &headers).await?;
    let store = state.store()?;
    store
        .delete(HERO_SLIDES, &id)
        .await
        .map_err(ApiError::store("Failed to delete slide"))?;

    tracing::info!(slide_id = %id, "Hero slide deleted");
    Ok(SuccessResponse::ok())
}
