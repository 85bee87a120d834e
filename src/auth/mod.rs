//! Authentication: password accounts, JWT access tokens, rotating refresh
//! sessions, and the cookies that carry them.

mod handlers;
mod jwt;
mod service;
mod session;

pub use handlers::{
    login, refresh, self_check, signout, signout_get, signout_options, signup, status,
    SessionResponse, SessionUser,
};
pub use jwt::{AccessClaims, Claims, JwtSecret};
pub use service::AuthAppService;
pub use session::{
    sanitize_redirect, IssuedSession, SessionService, ACCESS_COOKIE, LEGACY_COOKIES,
    REFRESH_COOKIE,
};
