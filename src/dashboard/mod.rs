//! Admin CMS JSON API.

mod handlers;

pub use handlers::*;
