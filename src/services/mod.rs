//! Business logic: post rules, search, and rate limiting.

pub mod posts;
pub mod rate_limit;
pub mod search;

pub use rate_limit::{client_ip, RateLimitDecision, RateLimiter};
pub use search::SearchService;
