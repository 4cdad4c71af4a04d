/**
 * Post Routes
 * Blog post API: public reads, admin writes and a public view counter
 */
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::auth::{optional_claims, require_admin};
use super::{with_id, Changes, SuccessResponse};
use crate::content::models::{Post, PostStatus, POSTS};
use crate::content::{
    derive_excerpt, estimate_read_time, normalize_tags, now, optional_text, reject_inline_image,
    require_text, sanitize_html, timestamp_value,
};
use crate::error::ApiError;
use crate::store::{get_typed, query_typed, to_document, Direction, Query as StoreQuery};
use crate::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;
const EXCERPT_CHARS: usize = 160;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/posts
#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// Request body for POST /api/posts/create
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<String>,
    pub author: Option<String>,
}

/// Request body for PUT /api/posts/{id}; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

fn parse_status(value: Option<&str>) -> Result<Option<PostStatus>, ApiError> {
    match optional_text(value) {
        None => Ok(None),
        Some(raw) => PostStatus::parse(&raw)
            .map(Some)
            .ok_or_else(|| ApiError::Validation("status must be 'draft' or 'published'".to_string())),
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Post not found".to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/posts - Newest first. Anonymous callers only see published posts.
pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let store = state.store()?;
    let is_admin = optional_claims(&state, &headers)
        .await
        .map(|c| c.admin)
        .unwrap_or(false);

    let status = if is_admin {
        parse_status(query.status.as_deref())?
    } else {
        Some(PostStatus::Published)
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut store_query = StoreQuery::new()
        .order_by("createdAt", Direction::Descending)
        .limit(limit);
    if let Some(status) = status {
        store_query = store_query.filter("status", status.as_str());
    }

    let posts = query_typed::<Post>(store.as_ref(), POSTS, &store_query)
        .await
        .map_err(ApiError::store("Failed to fetch posts"))?;
    Ok(Json(posts))
}

/// GET /api/posts/{id} - Drafts are only visible to admins
pub async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let store = state.store()?;
    let post = get_typed::<Post>(store.as_ref(), POSTS, &id)
        .await
        .map_err(ApiError::store("Failed to fetch post"))?
        .ok_or_else(not_found)?;

    if post.status != PostStatus::Published {
        let is_admin = optional_claims(&state, &headers)
            .await
            .map(|c| c.admin)
            .unwrap_or(false);
        if !is_admin {
            return Err(not_found());
        }
    }

    Ok(Json(post))
}

/// POST /api/posts/create - Create a post (draft unless told otherwise)
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let claims = require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let title = require_text(req.title.as_deref(), "Title")?;
    let content = require_text(req.content.as_deref(), "Content")?;
    let category = require_text(req.category.as_deref(), "Category")?;
    reject_inline_image(req.image.as_deref(), "image")?;
    let status = parse_status(req.status.as_deref())?.unwrap_or_default();

    let content = sanitize_html(&content);
    let timestamp = now();
    let post = Post {
        id: String::new(),
        excerpt: optional_text(req.excerpt.as_deref())
            .unwrap_or_else(|| derive_excerpt(&content, EXCERPT_CHARS)),
        read_time: estimate_read_time(&content),
        title,
        content,
        category,
        image: optional_text(req.image.as_deref()),
        tags: normalize_tags(&req.tags),
        status,
        author: optional_text(req.author.as_deref())
            .or(claims.email)
            .unwrap_or_default(),
        views: 0,
        created_at: timestamp,
        updated_at: timestamp,
    };

    let store = state.store()?;
    let doc = to_document(&post).map_err(ApiError::store("Failed to create post"))?;
    let id = store
        .add(POSTS, doc)
        .await
        .map_err(ApiError::store("Failed to create post"))?;

    tracing::info!(post_id = %id, status = status.as_str(), "Post created");
    Ok(Json(CreatedResponse { id }))
}

/// PUT /api/posts/{id} - Overwrite the given fields of an existing post
pub async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let Json(req) = payload?;

    let mut changes = Changes::new();
    if req.title.is_some() {
        changes.required("title", "Title", req.title.as_deref())?;
    }
    if req.category.is_some() {
        changes.required("category", "Category", req.category.as_deref())?;
    }
    if let Some(content) = req.content.as_deref() {
        let content = sanitize_html(require_text(Some(content), "Content")?.as_str());
        changes
            .set("readTime", estimate_read_time(&content))
            .set("content", content);
    }
    changes
        .image("image", req.image.as_deref())?
        .text("excerpt", req.excerpt.as_deref())
        .text("author", req.author.as_deref());
    if let Some(tags) = &req.tags {
        changes.set("tags", normalize_tags(tags));
    }
    if let Some(status) = parse_status(req.status.as_deref())? {
        changes.set("status", status.as_str());
    }
    changes.set("updatedAt", timestamp_value(&now()));

    let store = state.store()?;
    let fields = changes.into_document();
    store
        .update(POSTS, &id, fields.clone())
        .await
        .map_err(|e| {
            if e.is_not_found() {
                not_found()
            } else {
                ApiError::store("Failed to update post")(e)
            }
        })?;

    tracing::info!(post_id = %id, "Post updated");
    Ok(Json(with_id(&id, fields)))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&state, &headers).await?;
    let store = state.store()?;
    store
        .delete(POSTS, &id)
        .await
        .map_err(ApiError::store("Failed to delete post"))?;

    tracing::info!(post_id = %id, "Post deleted");
    Ok(SuccessResponse::ok())
}

/// POST /api/posts/{id}/view - Count one view
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store()?;
    store
        .increment(POSTS, &id, "views", 1)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                not_found()
            } else {
                ApiError::store("Failed to record view")(e)
            }
        })?;
    Ok(Json(json!({ "success": true })))
}
