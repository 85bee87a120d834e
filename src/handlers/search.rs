//! Search API: rate-limited full-text search, popular terms, suggestions.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::db::search_suggestions;
use crate::error::{AppError, AppResult};
use crate::handlers::http::{method_not_allowed, AppState};
use crate::handlers::posts::clamp_limit;
use crate::models::SearchQuery;
use crate::services::search::{validate_query, MAX_LIMIT, MAX_QUERY_CHARS};
use crate::services::{client_ip, RateLimitDecision};

const SEARCH_CACHE: &str = "public, max-age=60, stale-while-revalidate=300";
const POPULAR_CACHE: &str = "public, max-age=300, stale-while-revalidate=600";
const DEFAULT_POPULAR_TERMS: i64 = 10;
const DEFAULT_SUGGESTIONS: i64 = 5;
const MAX_SUGGESTIONS: i64 = 20;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Default, Deserialize)]
pub struct SuggestQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<String>,
}

fn rate_headers(decision: &RateLimitDecision) -> [(HeaderName, HeaderValue); 3] {
    [
        (HeaderName::from_static(HEADER_LIMIT), HeaderValue::from(decision.limit)),
        (
            HeaderName::from_static(HEADER_REMAINING),
            HeaderValue::from(decision.remaining),
        ),
        (HeaderName::from_static(HEADER_RESET), HeaderValue::from(decision.reset_at)),
    ]
}

/// GET /api/search
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(raw): Query<SearchQuery>,
) -> Response {
    let client = client_ip(&headers);
    let decision = state.rate_limiter().check(&client).await;
    if !decision.allowed {
        debug!(client = %client, "search rate limited");
        return (rate_headers(&decision), AppError::RateLimited).into_response();
    }

    let opts = match validate_query(&raw) {
        Ok(opts) => opts,
        Err(e) => return (rate_headers(&decision), e).into_response(),
    };

    match state.search().search(state.db(), &opts).await {
        Ok(page) => (
            rate_headers(&decision),
            [(header::CACHE_CONTROL, SEARCH_CACHE)],
            Json(json!({ "success": true, "data": page })),
        )
            .into_response(),
        Err(e) => (rate_headers(&decision), e).into_response(),
    }
}

/// POST /api/search
pub async fn search_post() -> Response {
    method_not_allowed("GET, OPTIONS", "Method not allowed")
}

/// OPTIONS /api/search
pub async fn search_options() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (header::ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
}

/// GET /api/search/popular?limit=
pub async fn popular_terms(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> impl IntoResponse {
    let limit = clamp_limit(query.limit.as_deref(), DEFAULT_POPULAR_TERMS, MAX_LIMIT);
    let terms = state.search().popular_terms(limit as usize).await;
    (
        [(header::CACHE_CONTROL, POPULAR_CACHE)],
        Json(json!({ "data": terms, "success": true })),
    )
}

/// GET /api/search/suggest?q=&limit=
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let prefix = query.q.as_deref().map(str::trim).unwrap_or_default();
    if prefix.is_empty() {
        return Ok(Json(json!({ "data": [], "success": true })));
    }
    let prefix: String = prefix.chars().take(MAX_QUERY_CHARS).collect();
    let limit = clamp_limit(query.limit.as_deref(), DEFAULT_SUGGESTIONS, MAX_SUGGESTIONS);
    let data = search_suggestions(state.db(), &prefix, limit)
        .await
        .map_err(|e| {
            warn!(error = %e, "suggestion query failed");
            AppError::Search(e.to_string())
        })?;
    Ok(Json(json!({ "data": data, "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_headers_carry_decision() {
        let decision = RateLimitDecision {
            allowed: true,
            limit: 30,
            remaining: 29,
            reset_at: 1_700_000_060,
        };
        let headers = rate_headers(&decision);
        assert_eq!(headers[0].1, "30");
        assert_eq!(headers[1].1, "29");
        assert_eq!(headers[2].1, "1700000060");
    }
}
