//! Admin JSON API: post CRUD, dashboard stats, categories. Auth required.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::db::{
    category_create, post_create, post_delete, post_get_by_id, post_stats, post_update,
    posts_list_all,
};
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::handlers::posts::parse_post_id;
use crate::middleware::auth::AuthUser;
use crate::models::{Category, CreateCategoryRequest, CreatePostRequest, Post, PostStats, UpdatePostRequest};
use crate::services::posts::{apply_update, build_create, slugify};

// ---- Posts ----

/// GET /api/admin/posts
pub async fn list_posts(State(state): State<AppState>, _user: AuthUser) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(posts_list_all(state.db()).await?))
}

/// POST /api/admin/posts
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let write = build_create(body, Utc::now())?;
    let post = post_create(state.db(), user.id, &write).await?;
    info!(post_id = post.id, author_id = %user.id, published = post.is_published, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/admin/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let id = parse_post_id(&id)?;
    let post = post_get_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    Ok(Json(post))
}

/// PUT /api/admin/posts/:id
pub async fn update_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdatePostRequest>,
) -> AppResult<Json<Post>> {
    let id = parse_post_id(&id)?;
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let existing = post_get_by_id(state.db(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    let write = apply_update(&existing, body, Utc::now())?;
    let post = post_update(state.db(), id, &write).await?;
    info!(post_id = id, editor_id = %user.id, published = post.is_published, "post updated");
    Ok(Json(post))
}

/// DELETE /api/admin/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_post_id(&id)?;
    post_delete(state.db(), id).await?;
    info!(post_id = id, editor_id = %user.id, "post deleted");
    Ok(Json(json!({ "message": "Post deleted" })))
}

// ---- Stats ----

/// GET /api/admin/stats
pub async fn get_stats(State(state): State<AppState>, _user: AuthUser) -> AppResult<Json<PostStats>> {
    Ok(Json(post_stats(state.db()).await?))
}

// ---- Categories ----

/// POST /api/admin/categories
pub async fn create_category(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(body): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let slug = match body.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slugify(slug)?,
        None => slugify(&body.name)?,
    };
    let category = category_create(
        state.db(),
        body.name.trim(),
        &slug,
        body.description.as_deref(),
        body.color.as_deref(),
    )
    .await?;
    info!(category = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}
