//! Auth JSON API: signup, login, refresh, signout, status, self-check.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{sanitize_redirect, AuthAppService, IssuedSession, REFRESH_COOKIE};
use crate::db::{user_get_by_id, UserRow};
use crate::error::AppError;
use crate::handlers::http::AppState;

pub const AUTH_ENDPOINTS: [&str; 6] = [
    "/api/auth/signup",
    "/api/auth/login",
    "/api/auth/status",
    "/api/auth/signout",
    "/api/auth/refresh",
    "/api/auth/test",
];

const NO_STORE: &str = "no-store, no-cache, must-revalidate";

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignoutQuery {
    pub next: Option<String>,
    /// `global` ends every session of the signed-in user.
    pub scope: Option<String>,
}

impl SignoutQuery {
    fn is_global(&self) -> bool {
        self.scope.as_deref() == Some("global")
    }
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl From<&UserRow> for SessionUser {
    fn from(user: &UserRow) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: Some(user.name.clone()),
            created_at: Some(user.created_at),
            last_sign_in_at: user.last_sign_in_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user: SessionUser,
    /// Access token expiry, unix seconds.
    pub expires_at: i64,
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SignupRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let user = AuthAppService::sign_up(state.db(), &body.name, &body.email, &body.password).await?;
    let session = state.sessions().issue(state.db(), user.id, &user.email).await?;
    info!(user_id = %user.id, "account created");
    Ok(session_reply(&state, jar, &session, SessionUser::from(&user), None))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let user = AuthAppService::sign_in(state.db(), &body.email, &body.password).await?;
    let session = state.sessions().issue(state.db(), user.id, &user.email).await?;
    info!(user_id = %user.id, "signed in");
    Ok(session_reply(&state, jar, &session, SessionUser::from(&user), None))
}

/// POST /api/auth/refresh: rotate the refresh cookie (or a body token).
pub async fn refresh(State(state): State<AppState>, jar: CookieJar, body: Bytes) -> Response {
    let from_body = || {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|r| r.refresh_token)
    };
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(from_body);

    let failed = |jar: CookieJar| {
        let jar = state.sessions().clear_cookies(jar);
        (
            jar,
            AppError::Auth("Failed to refresh session".to_string()),
        )
            .into_response()
    };

    let Some(token) = token else {
        return failed(jar);
    };
    match state.sessions().rotate(state.db(), &token).await {
        Ok(Some(session)) => {
            let user = SessionUser {
                id: session.user_id,
                email: session.email.clone(),
                name: None,
                created_at: None,
                last_sign_in_at: None,
            };
            session_reply(
                &state,
                jar,
                &session,
                user,
                Some("Session refreshed successfully"),
            )
            .into_response()
        }
        Ok(None) => failed(jar),
        Err(e) => {
            warn!(error = %e, "refresh failed");
            failed(jar)
        }
    }
}

/// POST /api/auth/signout?scope=
pub async fn signout(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SignoutQuery>,
) -> (CookieJar, Json<serde_json::Value>) {
    let jar = end_session(&state, jar, query.is_global()).await;
    (jar, Json(json!({ "message": "Successfully signed out" })))
}

/// GET /api/auth/signout?next=: sign out, then redirect.
pub async fn signout_get(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SignoutQuery>,
) -> (CookieJar, Redirect) {
    let jar = end_session(&state, jar, query.is_global()).await;
    let target = sanitize_redirect(query.next.as_deref(), "/auth/login");
    (jar, Redirect::to(&target))
}

/// OPTIONS /api/auth/signout: CORS preflight for the site origin.
pub async fn signout_options(State(state): State<AppState>) -> Response {
    let origin = HeaderValue::from_str(&state.config().site_url)
        .unwrap_or_else(|_| HeaderValue::from_static("null"));
    (
        StatusCode::OK,
        [
            (header::ALLOW, HeaderValue::from_static("POST, GET, OPTIONS")),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("POST, GET, OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ),
        ],
    )
        .into_response()
}

/// GET /api/auth/status: always 200 unless the user lookup fails.
pub async fn status(State(state): State<AppState>, jar: CookieJar) -> Response {
    let timestamp = Utc::now();
    let Some(claims) = state.sessions().resolve_cookie(&jar) else {
        return no_session(timestamp);
    };
    match user_get_by_id(state.db(), claims.user_id).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, NO_STORE), (header::PRAGMA, "no-cache")],
            Json(json!({
                "authenticated": true,
                "user": {
                    "id": user.id,
                    "email": user.email,
                    "created_at": user.created_at,
                    "last_sign_in_at": user.last_sign_in_at,
                },
                "expires_at": claims.expires_at.timestamp(),
                "timestamp": timestamp,
            })),
        )
            .into_response(),
        Ok(None) => no_session(timestamp),
        Err(e) => {
            warn!(error = %e, "auth status lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "authenticated": false,
                    "error": "Internal server error",
                    "timestamp": timestamp,
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/auth/test: auth subsystem health.
pub async fn self_check(State(state): State<AppState>, jar: CookieJar) -> Response {
    let started = Instant::now();
    let environment = json!({
        "jwtSecretConfigured": state.sessions().jwt().is_configured(),
        "redisConfigured": state.config().redis_url.is_some(),
        "uploadBackend": state.store().name(),
    });

    if let Err(e) = sqlx::query("SELECT 1").execute(state.db()).await {
        warn!(error = %e, "auth self-check: database unreachable");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "Database unreachable",
                "checks": { "environment": environment, "databaseConnection": false },
                "responseTime": started.elapsed().as_millis() as u64,
                "timestamp": Utc::now(),
            })),
        )
            .into_response();
    }

    let session_status = if state.sessions().resolve_cookie(&jar).is_some() {
        "Active session found"
    } else {
        "No active session"
    };
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, NO_STORE)],
        Json(json!({
            "success": true,
            "message": "Auth system is operational",
            "checks": {
                "environment": environment,
                "databaseConnection": true,
                "sessionStatus": session_status,
                "availableEndpoints": AUTH_ENDPOINTS,
            },
            "responseTime": started.elapsed().as_millis() as u64,
            "timestamp": Utc::now(),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
        .into_response()
}

fn no_session(timestamp: DateTime<Utc>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "authenticated": false,
            "message": "No active session",
            "timestamp": timestamp,
        })),
    )
        .into_response()
}

fn session_reply(
    state: &AppState,
    jar: CookieJar,
    session: &IssuedSession,
    user: SessionUser,
    message: Option<&'static str>,
) -> (CookieJar, Json<SessionResponse>) {
    let jar = state.sessions().set_cookies(jar, session);
    (
        jar,
        Json(SessionResponse {
            message,
            user,
            expires_at: session.access_expires_at.timestamp(),
        }),
    )
}

/// Revoke the refresh session (best effort) and clear the cookies. With
/// `global`, every session of the cookie's user is revoked as well.
async fn end_session(state: &AppState, jar: CookieJar, global: bool) -> CookieJar {
    let sessions = state.sessions();
    if global {
        if let Some(claims) = sessions.resolve_cookie(&jar) {
            if let Err(e) = sessions.revoke_all(state.db(), claims.user_id).await {
                warn!(error = %e, "failed to revoke sessions");
            }
        }
    }
    let refresh = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    if let Some(token) = refresh {
        if let Err(e) = sessions.revoke(state.db(), &token).await {
            warn!(error = %e, "failed to revoke refresh session");
        }
    }
    sessions.clear_cookies(jar)
}
