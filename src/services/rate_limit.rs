//! Fixed-window rate limiting per client, in Redis when available with an
//! in-process fallback.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::repositories::RedisRepository;

/// Local windows kept before stale ones are pruned.
const LOCAL_PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Unix time (seconds) at which the current window ends.
    pub reset_at: i64,
}

#[derive(Debug, Clone, Copy)]
struct LocalWindow {
    index: i64,
    count: u64,
}

pub struct RateLimiter {
    redis: Option<Arc<RedisRepository>>,
    local: Mutex<HashMap<String, LocalWindow>>,
    limit: u64,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(redis: Option<Arc<RedisRepository>>, limit: u64, window_secs: u64) -> Self {
        Self {
            redis,
            local: Mutex::new(HashMap::new()),
            limit,
            window_secs: window_secs.max(1),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Count one request for `client` and decide whether it may proceed.
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        self.check_at(client, chrono::Utc::now().timestamp()).await
    }

    pub async fn check_at(&self, client: &str, now_secs: i64) -> RateLimitDecision {
        let window = self.window_secs as i64;
        let index = now_secs.div_euclid(window);

        if let Some(redis) = &self.redis {
            let key = format!("{}:{}", client, index);
            match redis.rate_limit_hit(&key, self.window_secs).await {
                Ok((count, ttl)) => {
                    let ttl = if ttl > 0 { ttl } else { window };
                    return self.decide(count, now_secs + ttl);
                }
                Err(e) => {
                    warn!(error = %e, "redis rate-limit fallback");
                }
            }
        }

        let mut local = self.local.lock().await;
        if local.len() > LOCAL_PRUNE_THRESHOLD {
            local.retain(|_, w| w.index >= index);
        }
        let entry = local
            .entry(client.to_string())
            .or_insert(LocalWindow { index, count: 0 });
        if entry.index != index {
            *entry = LocalWindow { index, count: 0 };
        }
        entry.count += 1;
        let count = entry.count;
        drop(local);

        self.decide(count, (index + 1) * window)
    }

    fn decide(&self, count: u64, reset_at: i64) -> RateLimitDecision {
        RateLimitDecision {
            allowed: count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_at,
        }
    }
}

/// Client address for rate limiting: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then `unknown`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn blocks_after_limit_within_window() {
        let limiter = RateLimiter::new(None, 3, 60);
        let t = 1_700_000_000;
        for expected_remaining in [2, 1, 0] {
            let d = limiter.check_at("1.2.3.4", t).await;
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }
        let d = limiter.check_at("1.2.3.4", t + 1).await;
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn new_window_resets_count() {
        let limiter = RateLimiter::new(None, 1, 60);
        let t = 1_700_000_000 - (1_700_000_000 % 60);
        assert!(limiter.check_at("ip", t).await.allowed);
        assert!(!limiter.check_at("ip", t + 59).await.allowed);
        let d = limiter.check_at("ip", t + 60).await;
        assert!(d.allowed);
        assert_eq!(d.reset_at, t + 120);
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(None, 1, 60);
        assert!(limiter.check_at("a", 0).await.allowed);
        assert!(limiter.check_at("b", 0).await.allowed);
        assert!(!limiter.check_at("a", 0).await.allowed);
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "10.0.0.2");
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }
}
