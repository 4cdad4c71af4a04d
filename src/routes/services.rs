/**
 * Service Routes
 * Offered services. Updates overwrite the editable fields of an existing
 * document; deletes check that it exists first
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
use crate::content::models::{Service, DEFAULT_SERVICE_CATEGORY, SERVICES};
use crate::content::{now, optional_text, reject_inline_image, timestamp_value};
use crate::error::ApiError;
use crate::store::{query_typed, Direction, Query};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

impl ServiceRequest {
    /// Every editable field; unset ones are written as their defaults.
    fn changes(&self) -> Result<Changes, ApiError> {
        reject_inline_image(self.image_url.as_deref(), "imageUrl")?;
        let mut changes = Changes::new();
        changes
            .required("title", "Title", self.title.as_deref())?
            .set(
                "description",
                optional_text(self.description.as_deref()).unwrap_or_default(),
            )
            .set(
                "imageUrl",
                optional_text(self.image_url.as_deref()).unwrap_or_default(),
            )
            .set(
                "category",
                optional_text(self.category.as_deref())
                    .unwrap_or_else(|| DEFAULT_SERVICE_CATEGORY.to_string()),
            )
            .set("updatedAt", timestamp_value(&now()));
        Ok(changes)
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Service not found".to_string())
}

/// GET /api/services - Sorted by title
pub async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<Service>>, ApiError> {
    let store = state.store()?;
    let query = Query::new().order_by("title", Direction::Ascending);
    let services = query_typed::<Service>(store.as_ref(), SERVICES, &query)
        .await
        .map_err(ApiError::store("Failed to fetch services"))?;
    Ok(Json(services))
}

/// POST /api/services
pub async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let mut changes = req.changes()?;
    changes.set("createdAt", timestamp_value(&now()));
    let fields = changes.into_document();

    let store = state.store()?;
    let id = store
        .add(SERVICES, fields.clone())
        .await
        .map_err(ApiError::store("Failed to create service"))?;

    tracing::info!(service_id = %id, "Service created");
    Ok(Json(with_id(&id, fields)))
}

/// PUT /api/services/{id} - Overwrite title, description, image and category
pub async fn update_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let fields = req.changes()?.into_document();

    let store = state.store()?;
    store
        .update(SERVICES, &id, fields.clone())
        .await
        .map_err(|e| {
            if e.is_not_found() {
                not_found()
            } else {
                ApiError::store("Failed to update service")(e)
            }
        })?;

    tracing::info!(service_id = %id, "Service updated");
    Ok(Json(with_id(&id, fields)))
}

/// DELETE /api/services/{id} - 404 when the service does not exist
pub async fn delete_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&state, &headers).await?;
    let store = state.store()?;

    let existing = store
        .get(SERVICES, &id)
        .await
        .map_err(ApiError::store("Failed to delete service"))?;
    if existing.is_none() {
        return Err(not_found());
    }

    store
        .delete(SERVICES, &id)
        .await
        .map_err(ApiError::store("Failed to delete service"))?;

    tracing::info!(service_id = %id, "Service deleted");
    Ok(SuccessResponse::ok())
}
