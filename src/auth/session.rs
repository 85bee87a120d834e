//! Sessions: access/refresh token pairs mirrored into HTTP-only cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::jwt::{AccessClaims, JwtSecret};
use crate::auth::service::AuthAppService;
use crate::db::{
    refresh_session_consume, refresh_session_create, refresh_session_revoke,
    refresh_sessions_revoke_all, user_get_by_id, DbPool,
};
use crate::error::AppResult;

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

/// Cookie names written by earlier releases; cleared on sign-out.
pub const LEGACY_COOKIES: [&str; 3] = [
    "sb-auth-token",
    "supabase-auth-token",
    "supabase.auth.token",
];

/// A freshly issued token pair.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionService {
    jwt: JwtSecret,
    refresh_ttl: Duration,
    cookie_secure: bool,
}

impl SessionService {
    pub fn new(jwt: JwtSecret, refresh_ttl_days: i64, cookie_secure: bool) -> Self {
        Self {
            jwt,
            refresh_ttl: Duration::days(refresh_ttl_days.max(1)),
            cookie_secure,
        }
    }

    pub fn jwt(&self) -> &JwtSecret {
        &self.jwt
    }

    /// Issue an access token and persist a new refresh session.
    pub async fn issue(&self, pool: &DbPool, user_id: Uuid, email: &str) -> AppResult<IssuedSession> {
        let (access_token, access_expires_at) = self.jwt.issue(user_id, email)?;
        let refresh_token = AuthAppService::generate_refresh_token();
        let refresh_expires_at = Utc::now() + self.refresh_ttl;
        refresh_session_create(
            pool,
            user_id,
            &AuthAppService::hash_refresh_token(&refresh_token),
            refresh_expires_at,
        )
        .await?;
        debug!(%user_id, "session issued");
        Ok(IssuedSession {
            user_id,
            email: email.to_string(),
            access_token,
            access_expires_at,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// revoked; `None` when it is unknown, expired, already used, or its
    /// user no longer exists.
    pub async fn rotate(&self, pool: &DbPool, refresh_token: &str) -> AppResult<Option<IssuedSession>> {
        let hash = AuthAppService::hash_refresh_token(refresh_token);
        let Some(user_id) = refresh_session_consume(pool, &hash).await? else {
            return Ok(None);
        };
        let Some(user) = user_get_by_id(pool, user_id).await? else {
            return Ok(None);
        };
        let session = self.issue(pool, user.id, &user.email).await?;
        info!(%user_id, "session refreshed");
        Ok(Some(session))
    }

    pub async fn revoke(&self, pool: &DbPool, refresh_token: &str) -> AppResult<()> {
        refresh_session_revoke(pool, &AuthAppService::hash_refresh_token(refresh_token)).await
    }

    /// Revoke every refresh session of `user_id`; returns how many were live.
    pub async fn revoke_all(&self, pool: &DbPool, user_id: Uuid) -> AppResult<u64> {
        let revoked = refresh_sessions_revoke_all(pool, user_id).await?;
        info!(%user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// Claims of a valid access token, or `None`.
    pub fn resolve_access(&self, token: &str) -> Option<AccessClaims> {
        self.jwt.validate(token).ok()
    }

    /// Claims from the access cookie in `jar`.
    pub fn resolve_cookie(&self, jar: &CookieJar) -> Option<AccessClaims> {
        jar.get(ACCESS_COOKIE)
            .map(|c| c.value())
            .filter(|v| !v.is_empty())
            .and_then(|v| self.resolve_access(v))
    }

    /// Add both session cookies to `jar`.
    pub fn set_cookies(&self, jar: CookieJar, session: &IssuedSession) -> CookieJar {
        jar.add(self.cookie(
            ACCESS_COOKIE,
            session.access_token.clone(),
            to_offset(session.access_expires_at),
        ))
        .add(self.cookie(
            REFRESH_COOKIE,
            session.refresh_token.clone(),
            to_offset(session.refresh_expires_at),
        ))
    }

    /// Expire the session cookies and the legacy names.
    pub fn clear_cookies(&self, jar: CookieJar) -> CookieJar {
        [ACCESS_COOKIE, REFRESH_COOKIE]
            .into_iter()
            .chain(LEGACY_COOKIES)
            .fold(jar, |jar, name| {
                jar.add(self.cookie(name, String::new(), OffsetDateTime::UNIX_EPOCH))
            })
    }

    fn cookie(&self, name: &'static str, value: String, expires: OffsetDateTime) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.cookie_secure)
            .expires(expires)
            .build()
    }
}

fn to_offset(at: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(at.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Accept only same-site relative paths for post-login redirects.
pub fn sanitize_redirect(target: Option<&str>, default: &str) -> String {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.contains('\\') => t.to_string(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secure: bool) -> SessionService {
        SessionService::new(
            JwtSecret::new("test-jwt-secret-with-at-least-32-chars".to_string(), 3600),
            365,
            secure,
        )
    }

    fn issued() -> IssuedSession {
        IssuedSession {
            user_id: Uuid::new_v4(),
            email: "a@b.co".to_string(),
            access_token: "access".to_string(),
            access_expires_at: Utc::now() + Duration::hours(1),
            refresh_token: "refresh".to_string(),
            refresh_expires_at: Utc::now() + Duration::days(365),
        }
    }

    #[test]
    fn session_cookies_are_http_only_lax_root() {
        let jar = service(false).set_cookies(CookieJar::new(), &issued());
        for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
            let c = jar.get(name).unwrap();
            assert_eq!(c.http_only(), Some(true));
            assert_eq!(c.same_site(), Some(SameSite::Lax));
            assert_eq!(c.path(), Some("/"));
            assert_eq!(c.secure(), Some(false));
        }
        assert_eq!(jar.get(ACCESS_COOKIE).unwrap().value(), "access");
        assert_eq!(jar.get(REFRESH_COOKIE).unwrap().value(), "refresh");
    }

    #[test]
    fn secure_flag_follows_config() {
        let jar = service(true).set_cookies(CookieJar::new(), &issued());
        assert_eq!(jar.get(ACCESS_COOKIE).unwrap().secure(), Some(true));
    }

    #[test]
    fn refresh_cookie_outlives_access_cookie() {
        let jar = service(false).set_cookies(CookieJar::new(), &issued());
        let access = jar.get(ACCESS_COOKIE).unwrap().expires_datetime().unwrap();
        let refresh = jar.get(REFRESH_COOKIE).unwrap().expires_datetime().unwrap();
        assert!(refresh > access);
    }

    #[test]
    fn clear_expires_current_and_legacy_names() {
        let jar = service(false).clear_cookies(CookieJar::new());
        for name in [ACCESS_COOKIE, REFRESH_COOKIE, "sb-auth-token", "supabase.auth.token"] {
            let c = jar.get(name).unwrap();
            assert_eq!(c.value(), "");
            assert_eq!(c.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
        }
    }

    #[test]
    fn resolve_cookie_reads_valid_access_token() {
        let svc = service(false);
        let id = Uuid::new_v4();
        let (token, _) = svc.jwt().issue(id, "a@b.co").unwrap();
        let jar = CookieJar::new().add(Cookie::new(ACCESS_COOKIE, token));
        assert_eq!(svc.resolve_cookie(&jar).map(|c| c.user_id), Some(id));

        let bad = CookieJar::new().add(Cookie::new(ACCESS_COOKIE, "garbage"));
        assert!(svc.resolve_cookie(&bad).is_none());
        assert!(svc.resolve_cookie(&CookieJar::new()).is_none());
    }

    #[test]
    fn redirect_targets_are_sanitised() {
        assert_eq!(sanitize_redirect(Some("/admin/posts"), "/admin"), "/admin/posts");
        assert_eq!(sanitize_redirect(Some("//evil.example"), "/admin"), "/admin");
        assert_eq!(sanitize_redirect(Some("https://evil.example"), "/admin"), "/admin");
        assert_eq!(sanitize_redirect(Some("/\\evil"), "/admin"), "/admin");
        assert_eq!(sanitize_redirect(None, "/auth/login"), "/auth/login");
    }
}
