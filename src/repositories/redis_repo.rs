//! Redis connection for search rate-limit counters and popular search terms.

use crate::error::AppError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

const RATE_LIMIT_PREFIX: &str = "inkwell:ratelimit:";
const SEARCH_TERMS_KEY: &str = "inkwell:search:terms";

/// Connect retries before a call gives up and the caller falls back.
const CONNECT_RETRIES: usize = 1;
const RETRY_BACKOFF_BASE: u64 = 2;
const RETRY_BACKOFF_FACTOR_MS: u64 = 100;

/// Redis-backed repository. One shared `ConnectionManager` is opened on
/// first use and reconnects on its own; until Redis answers, calls fail and
/// callers fall back.
#[derive(Clone)]
pub struct RedisRepository {
    client: redis::Client,
    manager: Arc<OnceCell<ConnectionManager>>,
}

impl RedisRepository {
    /// Create repository from Redis URL.
    pub fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            manager: Arc::new(OnceCell::new()),
        })
    }

    /// Handle to the shared managed connection.
    pub async fn connection(&self) -> Result<ConnectionManager, AppError> {
        let manager = self
            .manager
            .get_or_try_init(|| {
                ConnectionManager::new_with_backoff(
                    self.client.clone(),
                    RETRY_BACKOFF_BASE,
                    RETRY_BACKOFF_FACTOR_MS,
                    CONNECT_RETRIES,
                )
            })
            .await?;
        Ok(manager.clone())
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// Increment the counter for a rate-limit window. The first hit sets the
    /// expiry. Returns `(count, ttl_secs)`.
    pub async fn rate_limit_hit(&self, window_key: &str, window_secs: u64) -> Result<(u64, i64), AppError> {
        let mut conn = self.connection().await?;
        let key = format!("{}{}", RATE_LIMIT_PREFIX, window_key);
        let count: u64 = conn.incr(&key, 1u64).await?;
        if count == 1 {
            conn.expire::<_, ()>(&key, window_secs as i64).await?;
        }
        let ttl: i64 = conn.ttl(&key).await?;
        debug!(key = %key, count, ttl, "rate limit hit");
        Ok((count, ttl))
    }

    /// Add one to a search term's score.
    pub async fn search_term_record(&self, term: &str) -> Result<(), AppError> {
        let mut conn = self.connection().await?;
        conn.zincr::<_, _, _, ()>(SEARCH_TERMS_KEY, term, 1i64).await?;
        Ok(())
    }

    /// Highest-scoring search terms.
    pub async fn search_terms_top(&self, limit: usize) -> Result<Vec<String>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let terms: Vec<String> = conn
            .zrevrange(SEARCH_TERMS_KEY, 0, limit as isize - 1)
            .await?;
        Ok(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_managed_connection() {
        let repo = RedisRepository::new("redis://127.0.0.1:6379/").unwrap();
        let clone = repo.clone();
        assert!(Arc::ptr_eq(&repo.manager, &clone.manager));
        assert!(repo.manager.get().is_none());
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(RedisRepository::new("not a redis url").is_err());
    }
}
