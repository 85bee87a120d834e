//! Request extractors and the session guard layer.

pub mod auth;
pub mod session;

pub use auth::{AuthUser, MaybeUser};
pub use session::session_sync;
