use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use signpost_core::{CacheError, CacheStore, Fetch, Key, ScratchBuffer};
use tracing::{debug, trace};

/// Type alias for cache results.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A Redis-backed [`CacheStore`].
///
/// Values are stored as plain strings under `key_prefix + key` and written
/// with `SET key value EX ttl`, so expiry is enforced by the server.
#[derive(Debug, Clone)]
pub struct RedisCacheStore {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let timed_out = err.is_timeout();
    let unavailable = err.is_connection_dropped() || err.is_connection_refusal();
    let message = format!("{operation}: {err}");
    if timed_out || message.to_ascii_lowercase().contains("timed out") {
        CacheError::Timeout(message)
    } else if unavailable {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

/// Redis `EX` takes whole seconds and rejects zero.
fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

impl RedisCacheStore {
    /// Creates a cache store that uses keys as-is.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, "")
    }

    /// Creates a cache store that namespaces every key with `key_prefix`.
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Opens a multiplexed connection from a `redis://host:port/` URL.
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| map_redis_error("invalid Redis connection info", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;

        debug!(url, "connected to Redis");
        Ok(Self::with_prefix(conn, key_prefix))
    }

    fn cache_key(&self, key: &Key) -> String {
        cache_key(&self.key_prefix, key)
    }
}

fn cache_key(prefix: &str, key: &Key) -> String {
    format!("{prefix}{}", key.as_str())
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&mut self, key: &Key, value: &mut ScratchBuffer) -> Result<Fetch> {
        let cache_key = self.cache_key(key);
        trace!(key = %key, "fetching value from Redis");

        let cached = self
            .conn
            .get::<_, Option<String>>(&cache_key)
            .await
            .map_err(|e| map_redis_error("failed to fetch value from Redis", e))?;

        match cached {
            Some(cached) if !cached.is_empty() => {
                value.adopt(cached);
                Ok(Fetch::Found)
            }
            _ => Ok(Fetch::NotFound),
        }
    }

    async fn set(&mut self, key: &Key, value: &str, ttl: Duration) -> Result<()> {
        let cache_key = self.cache_key(key);
        trace!(key = %key, ttl_secs = expiry_seconds(ttl), "writing value to Redis");

        self.conn
            .set_ex::<_, _, ()>(&cache_key, value, expiry_seconds(ttl))
            .await
            .map_err(|e| map_redis_error("failed to write value to Redis", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed() {
        let key = Key::new("alice").unwrap();
        assert_eq!(cache_key("", &key), "alice");
        assert_eq!(cache_key("sp:", &key), "sp:alice");
    }

    #[test]
    fn expiry_is_whole_seconds_and_never_zero() {
        assert_eq!(expiry_seconds(Duration::from_secs(300)), 300);
        assert_eq!(expiry_seconds(Duration::from_millis(1500)), 1);
        assert_eq!(expiry_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn timeouts_are_classified() {
        let err = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        ));
        assert!(matches!(
            map_redis_error("get", err),
            CacheError::Timeout(_)
        ));
    }
}
