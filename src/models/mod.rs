//! Data models for posts, categories, and search.

pub mod category;
pub mod post;
pub mod search;

pub use category::*;
pub use post::*;
pub use search::*;
