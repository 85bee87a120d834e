//! Session guard for the admin area and the auth pages.
//!
//! Resolves the session from the cookies, rotating an expired access token
//! through the refresh cookie, and mirrors any new cookies onto whatever
//! response the route produces.

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{sanitize_redirect, REFRESH_COOKIE};
use crate::handlers::http::AppState;
use crate::middleware::auth::AuthUser;

pub const LOGIN_PATH: &str = "/auth/login";
pub const ADMIN_HOME: &str = "/admin";

const AUTH_PAGES: [&str; 3] = [LOGIN_PATH, "/auth/signup", "/auth/reset-password"];

#[derive(Debug, Default, Deserialize)]
struct RedirectParams {
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

pub fn is_admin_path(path: &str) -> bool {
    path == ADMIN_HOME || path.starts_with("/admin/")
}

fn is_guarded(path: &str) -> bool {
    is_admin_path(path) || AUTH_PAGES.contains(&path)
}

pub async fn session_sync(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if !is_guarded(&path) {
        return next.run(request).await;
    }

    let sessions = state.sessions();
    let jar = CookieJar::from_headers(request.headers());
    let mut user = sessions.resolve_cookie(&jar).map(AuthUser::from);
    let mut jar = jar;

    if user.is_none() {
        let refresh = jar
            .get(REFRESH_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());
        if let Some(refresh) = refresh {
            match sessions.rotate(state.db(), &refresh).await {
                Ok(Some(session)) => {
                    debug!(user_id = %session.user_id, path = %path, "session refreshed by guard");
                    jar = sessions.set_cookies(jar, &session);
                    user = Some(AuthUser {
                        id: session.user_id,
                        email: session.email,
                    });
                }
                Ok(None) => {
                    debug!(path = %path, "stale refresh cookie cleared");
                    jar = sessions.clear_cookies(jar);
                }
                Err(e) => warn!(error = %e, path = %path, "session lookup failed"),
            }
        }
    }

    let response = if is_admin_path(&path) && user.is_none() {
        let original = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());
        Redirect::to(&login_redirect(&original)).into_response()
    } else if path == LOGIN_PATH && user.is_some() {
        let params = Query::<RedirectParams>::try_from_uri(request.uri())
            .map(|q| q.0)
            .unwrap_or_default();
        Redirect::to(&sanitize_redirect(params.redirect_to.as_deref(), ADMIN_HOME)).into_response()
    } else {
        if let Some(user) = user {
            request.extensions_mut().insert(user);
        }
        next.run(request).await
    };

    (jar, response).into_response()
}

/// `/auth/login?redirectTo=<target>`.
pub fn login_redirect(target: &str) -> String {
    format!("{}?redirectTo={}", LOGIN_PATH, urlencoding::encode(target))
}
