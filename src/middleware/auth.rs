//! Auth extractors: the signed-in user from a Bearer token or session cookie.

use axum::http::{header::AUTHORIZATION, request::Parts};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::auth::AccessClaims;
use crate::error::AppError;
use crate::handlers::http::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Extractor: authenticated user. Rejects with 401.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

impl From<AccessClaims> for AuthUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.user_id,
            email: claims.email,
        }
    }
}

/// Extractor: authenticated user if any. Never rejects.
#[derive(Clone, Debug)]
pub struct MaybeUser(pub Option<AuthUser>);

fn resolve(parts: &Parts, state: &AppState) -> Option<AuthUser> {
    // Set by the session guard after a cookie refresh.
    if let Some(user) = parts.extensions.get::<AuthUser>() {
        return Some(user.clone());
    }
    let sessions = state.sessions();
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX));
    if let Some(token) = bearer {
        return sessions.resolve_access(token).map(AuthUser::from);
    }
    sessions
        .resolve_cookie(&CookieJar::from_headers(&parts.headers))
        .map(AuthUser::from)
}

#[axum::async_trait]
impl axum::extract::FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state).ok_or_else(|| AppError::Auth("Authentication required".to_string()))
    }
}

#[axum::async_trait]
impl axum::extract::FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state)))
    }
}
