//! Public post API: categories, tags, popular posts, view counting.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::db::{categories_list_with_counts, post_increment_views, posts_popular, tags_with_counts};
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::models::{Category, TagCount};

const DEFAULT_POPULAR: i64 = 5;
const MAX_POPULAR: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

/// `limit` clamped to `1..=max`; unparsable or missing → `default`.
pub fn clamp_limit(raw: Option<&str>, default: i64, max: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(1, max)
}

/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(categories_list_with_counts(state.db()).await?))
}

/// GET /api/tags
pub async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<TagCount>>> {
    Ok(Json(tags_with_counts(state.db()).await?))
}

/// GET /api/posts/popular?limit=
pub async fn popular_posts(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = clamp_limit(query.limit.as_deref(), DEFAULT_POPULAR, MAX_POPULAR);
    let posts = posts_popular(state.db(), limit).await?;
    Ok(Json(json!({ "data": posts, "success": true })))
}

/// POST /api/posts/:id/views
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_post_id(&id)?;
    post_increment_views(state.db(), id).await?;
    debug!(post_id = id, "view recorded");
    Ok(Json(json!({ "success": true })))
}

/// Positive integer post id, else 400 "Invalid post ID".
pub fn parse_post_id(raw: &str) -> AppResult<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest("Invalid post ID".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_ids_must_be_positive_integers() {
        assert_eq!(parse_post_id("42").unwrap(), 42);
        assert!(parse_post_id("0").is_err());
        assert!(parse_post_id("-3").is_err());
        assert!(parse_post_id("abc").is_err());
        assert!(parse_post_id("1.5").is_err());
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 5, 50), 5);
        assert_eq!(clamp_limit(Some("0"), 5, 50), 1);
        assert_eq!(clamp_limit(Some("500"), 5, 50), 50);
        assert_eq!(clamp_limit(Some("x"), 5, 50), 5);
        assert_eq!(clamp_limit(Some(" 7 "), 5, 50), 7);
    }
}
