//! Shared application state, health, and small response helpers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::auth::{JwtSecret, SessionService};
use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::pages::Templates;
use crate::repositories::RedisRepository;
use crate::services::{RateLimiter, SearchService};
use crate::storage::{build_store, ObjectStore};

/// Shared application state for the API, pages, and middleware.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    db: DbPool,
    redis: Option<Arc<RedisRepository>>,
    sessions: SessionService,
    rate_limiter: Arc<RateLimiter>,
    search: SearchService,
    templates: Arc<Templates>,
    store: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Wire services from config. `redis` is `None` when Redis is disabled.
    pub fn new(config: Config, db: DbPool, redis: Option<Arc<RedisRepository>>) -> AppResult<Self> {
        let jwt = JwtSecret::new(config.jwt_secret.clone(), config.access_token_ttl_secs);
        let sessions = SessionService::new(jwt, config.refresh_token_ttl_days, config.cookie_secure);
        let rate_limiter = Arc::new(RateLimiter::new(
            redis.clone(),
            config.search_rate_limit,
            config.search_rate_window_secs,
        ));
        let search = SearchService::new(redis.clone());
        let templates = Templates::new().map_err(|e| AppError::Config(e.to_string()))?;
        let store = build_store(config.upload_backend());
        Ok(Self {
            config: Arc::new(config),
            db,
            redis,
            sessions,
            rate_limiter,
            search,
            templates: Arc::new(templates),
            store,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn db(&self) -> &DbPool {
        &self.db
    }
    pub fn redis(&self) -> Option<&RedisRepository> {
        self.redis.as_deref()
    }
    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
    pub fn search(&self) -> &SearchService {
        &self.search
    }
    pub fn templates(&self) -> &Templates {
        &self.templates
    }
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }
}

/// GET /health: liveness probe; reports Redis reachability when configured.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let redis = match state.redis() {
        Some(redis) => match redis.ping().await {
            Ok(()) => "ok",
            Err(_) => "unreachable",
        },
        None => "disabled",
    };
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "inkwell", "redis": redis })),
    )
}

/// 405 with an `Allow` header and a JSON body.
pub fn method_not_allowed(allow: &'static str, message: &str) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, allow)],
        Json(json!({ "error": message, "code": "METHOD_NOT_ALLOWED" })),
    )
        .into_response()
}
