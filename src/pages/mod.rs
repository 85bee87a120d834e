//! Server-rendered HTML pages.

pub mod admin;
pub mod auth;
pub mod blog;
pub mod render;

pub use render::Templates;
