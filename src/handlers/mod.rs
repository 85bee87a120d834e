//! JSON API handlers.

pub mod http;
pub mod posts;
pub mod search;
pub mod upload;

pub use http::*;
