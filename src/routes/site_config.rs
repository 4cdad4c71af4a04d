/**
 * Site Configuration Routes
 * Read and write the singleton configuration document. Every save drops
 * the cached copy used by the public pages
 */
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::auth::require_admin;
use super::Changes;
use crate::content::models::{GalleryItem, HeroSlide, SITE_CONFIG, SITE_CONFIG_ID};
use crate::content::{now, optional_text, reject_inline_image, require_text, timestamp_value};
use crate::error::ApiError;
use crate::store::Document;
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub config: Option<Document>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItemInput {
    pub id: Option<String>,
    pub image_url: Option<String>,
    pub caption: Option<String>,
}

/// Request body for PUT /api/config
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub maintenance_mode: Option<bool>,
    pub gallery: Option<Vec<GalleryItemInput>>,
    pub contact_email: Option<String>,
    pub site_name: Option<String>,
}

fn gallery_items(inputs: &[GalleryItemInput]) -> Result<Vec<GalleryItem>, ApiError> {
    inputs
        .iter()
        .map(|item| -> Result<GalleryItem, ApiError> {
            reject_inline_image(item.image_url.as_deref(), "gallery imageUrl")?;
            Ok(GalleryItem {
                id: optional_text(item.id.as_deref())
                    .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
                image_url: require_text(item.image_url.as_deref(), "gallery imageUrl")?,
                caption: optional_text(item.caption.as_deref()).unwrap_or_default(),
            })
        })
        .collect()
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "contactEmail must be a valid email address".to_string(),
        ))
    }
}

/// Every slide must decode as a hero slide, and inline image data is
/// refused.
fn validate_hero_slides(slides: &[Value]) -> Result<(), ApiError> {
    for (index, slide) in slides.iter().enumerate() {
        let Some(fields) = slide.as_object() else {
            return Err(ApiError::Validation(
                "heroSlides must be an array of objects".to_string(),
            ));
        };
        reject_inline_image(fields.get("imageUrl").and_then(Value::as_str), "heroSlides imageUrl")?;
        serde_json::from_value::<HeroSlide>(slide.clone()).map_err(|e| {
            ApiError::Validation(format!("heroSlides[{}] is invalid: {}", index, e))
        })?;
    }
    Ok(())
}

async fn merge_config(state: &AppState, changes: Changes, context: &'static str) -> Result<Document, ApiError> {
    let mut changes = changes;
    changes.set("updatedAt", timestamp_value(&now()));
    let fields = changes.into_document();

    let store = state.store()?;
    store
        .merge(SITE_CONFIG, SITE_CONFIG_ID, fields.clone())
        .await
        .map_err(ApiError::store(context))?;

    state.site_config.invalidate();
    Ok(fields)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/config/get - The stored configuration, or null
pub async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigResponse>, ApiError> {
    let store = state.store()?;
    let config = store
        .get(SITE_CONFIG, SITE_CONFIG_ID)
        .await
        .map_err(ApiError::store("Failed to fetch configuration"))?;
    Ok(Json(ConfigResponse { config }))
}

/// POST /api/config/save - Replace the hero slides held in the configuration
pub async fn save_hero_slides(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(body) = payload?;

    let slides = match body.get("heroSlides") {
        Some(Value::Array(slides)) => slides.clone(),
        _ => {
            return Err(ApiError::Validation(
                "heroSlides must be an array".to_string(),
            ))
        }
    };
    validate_hero_slides(&slides)?;

    let count = slides.len();
    let mut changes = Changes::new();
    changes.set("heroSlides", slides);
    merge_config(&state, changes, "Failed to save configuration").await?;

    tracing::info!(slides = count, "Hero slides saved to site configuration");
    Ok(Json(json!({ "success": true })))
}

/// PUT /api/config - Merge maintenance mode, gallery, contact email and site name
pub async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(update) = payload?;

    let mut changes = Changes::new();
    if let Some(maintenance) = update.maintenance_mode {
        changes.set("maintenanceMode", maintenance);
    }
    if let Some(gallery) = &update.gallery {
        let items = gallery_items(gallery)?;
        let items = serde_json::to_value(items).map_err(|e| ApiError::Validation(e.to_string()))?;
        changes.set("gallery", items);
    }
    if let Some(email) = &update.contact_email {
        let email = email.trim();
        if !email.is_empty() {
            validate_email(email)?;
        }
        changes.set("contactEmail", email);
    }
    if let Some(name) = &update.site_name {
        changes.set("siteName", name.trim());
    }
    if changes.is_empty() {
        return Err(ApiError::Validation(
            "No configuration fields provided".to_string(),
        ));
    }

    let fields = merge_config(&state, changes, "Failed to update configuration").await?;
    if let Some(maintenance) = update.maintenance_mode {
        tracing::info!(maintenance, "Maintenance mode set");
    }
    Ok(Json(json!({ "success": true, "config": fields })))
}
