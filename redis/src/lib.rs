//! Redis backend for the Freightline route cache.
//!
//! Entries are plain string values written with `SET EX`. Pattern operations
//! walk the keyspace with `SCAN MATCH` so they never block the server the way
//! `KEYS` would.
//!
//! # Example
//!
//! ```no_run
//! use freightline_core::cache::{CacheTtlPolicy, RouteCache};
//! use freightline_redis::RedisCacheBackend;
//!
//! # async fn example() -> Result<(), freightline_core::CacheError> {
//! let backend = RedisCacheBackend::connect("redis://127.0.0.1:6379").await?;
//! let cache = RouteCache::new(backend, CacheTtlPolicy::default());
//! let stats = cache.stats().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use freightline_core::CacheError;
use freightline_core::cache::CacheBackend;

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// [`CacheBackend`] over a Redis `ConnectionManager`.
///
/// Cloning is cheap; clones share the managed connection, which reconnects
/// on its own after a failure.
#[derive(Clone)]
pub struct RedisCacheBackend {
    conn_manager: ConnectionManager,
}

impl RedisCacheBackend {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("Connected to Redis");
        Ok(Self { conn_manager })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    /// Every key matching `pattern`.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn_manager.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(translate)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend").finish_non_exhaustive()
    }
}

fn translate(err: RedisError) -> CacheError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        CacheError::Unavailable(err.to_string())
    } else {
        CacheError::Command(err.to_string())
    }
}

impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn_manager.clone();
        conn.get(key).await.map_err(translate)
    }

    async fn set_ex(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(translate)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        conn.del::<_, ()>(key).await.map_err(translate)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.scan(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn_manager.clone();
        let mut deleted = 0u64;
        for chunk in keys.chunks(SCAN_BATCH) {
            let n: u64 = conn.del(chunk).await.map_err(translate)?;
            deleted += n;
        }
        tracing::debug!(pattern, deleted, "Deleted keys by pattern");
        Ok(deleted)
    }

    async fn count_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.scan(pattern).await?;
        Ok(u64::try_from(keys.len()).unwrap_or(u64::MAX))
    }
}
