//! Read-through cache for route search results.
//!
//! Keys are `routes:<ORIGIN>:<DEST>:<YYYY-MM-DD>` and values are the JSON
//! encoding of [`RouteSearchResult`]. Every operation is best-effort: backend
//! failures are logged, counted and treated as a miss or a no-op so a cache
//! outage never fails a search.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::CacheError;
use crate::metrics::ROUTE_CACHE_ERRORS;
use crate::routes::{RouteQuery, RouteSearchResult};
use crate::types::AirportCode;

/// Prefix shared by every route cache key.
pub const ROUTE_KEY_PREFIX: &str = "routes";

/// Key-value store with expiry and pattern operations.
///
/// Patterns use glob syntax (`*` matches any run of characters), as Redis
/// `SCAN MATCH` does.
pub trait CacheBackend: Send + Sync {
    /// Fetch a value.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CacheError>> + Send;

    /// Store a value that expires after `ttl_seconds`.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl_seconds: u64,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Remove a key. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Remove every key matching `pattern`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    fn delete_matching(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<u64, CacheError>> + Send;

    /// Count keys matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    fn count_matching(&self, pattern: &str) -> impl Future<Output = Result<u64, CacheError>> + Send;
}

/// Expiry chosen from how far away the departure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtlPolicy {
    /// Departure today or tomorrow.
    pub near_seconds: u64,
    /// Departure within a week.
    pub week_seconds: u64,
    /// Anything further out.
    pub default_seconds: u64,
}

impl Default for CacheTtlPolicy {
    fn default() -> Self {
        Self {
            near_seconds: 300,
            week_seconds: 1800,
            default_seconds: 3600,
        }
    }
}

impl CacheTtlPolicy {
    /// TTL for a departure `days_until_departure` days away.
    ///
    /// # Examples
    ///
    /// ```
    /// use freightline_core::cache::CacheTtlPolicy;
    ///
    /// let policy = CacheTtlPolicy::default();
    /// assert_eq!(policy.ttl_for(0), 300);
    /// assert_eq!(policy.ttl_for(7), 1800);
    /// assert_eq!(policy.ttl_for(8), 3600);
    /// ```
    #[must_use]
    pub const fn ttl_for(&self, days_until_departure: i64) -> u64 {
        if days_until_departure <= 1 {
            self.near_seconds
        } else if days_until_departure <= 7 {
            self.week_seconds
        } else {
            self.default_seconds
        }
    }
}

/// Key counts reported by [`RouteCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Every key in the backing store.
    pub total_keys: u64,
    /// Keys owned by the route cache.
    pub route_cache_keys: u64,
}

/// Cache key for a route on a date.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use freightline_core::{cache::route_key, AirportCode};
///
/// let key = route_key(
///     &AirportCode::parse("del").unwrap(),
///     &AirportCode::parse("dxb").unwrap(),
///     NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
/// );
/// assert_eq!(key, "routes:DEL:DXB:2026-06-01");
/// ```
#[must_use]
pub fn route_key(origin: &AirportCode, destination: &AirportCode, date: NaiveDate) -> String {
    format!(
        "{ROUTE_KEY_PREFIX}:{origin}:{destination}:{}",
        date.format("%Y-%m-%d")
    )
}

/// Route search cache over a [`CacheBackend`].
#[derive(Debug, Clone)]
pub struct RouteCache<B> {
    backend: B,
    ttl: CacheTtlPolicy,
}

impl<B: CacheBackend> RouteCache<B> {
    /// Create a cache with the given TTL policy.
    #[must_use]
    pub const fn new(backend: B, ttl: CacheTtlPolicy) -> Self {
        Self { backend, ttl }
    }

    /// The TTL policy.
    #[must_use]
    pub const fn ttl_policy(&self) -> &CacheTtlPolicy {
        &self.ttl
    }

    /// Cached result for `query`, or `None` on miss, backend error or an
    /// undecodable payload.
    pub async fn get(&self, query: &RouteQuery) -> Option<RouteSearchResult> {
        let key = route_key(&query.origin, &query.destination, query.departure_date);
        let raw = match self.backend.get(&key).await {
            Ok(raw) => raw?,
            Err(error) => {
                record_error("get");
                tracing::warn!(key = %key, error = %error, "Route cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(result) => Some(result),
            Err(error) => {
                record_error("decode");
                tracing::warn!(
                    key = %key,
                    error = %error,
                    "Discarding undecodable route cache entry"
                );
                None
            }
        }
    }

    /// Store `result` for `query` with an explicit TTL.
    pub async fn set(&self, query: &RouteQuery, result: &RouteSearchResult, ttl_seconds: u64) {
        let key = route_key(&query.origin, &query.destination, query.departure_date);
        let payload = match serde_json::to_string(result) {
            Ok(payload) => payload,
            Err(error) => {
                record_error("encode");
                tracing::warn!(key = %key, error = %error, "Failed to encode route cache entry");
                return;
            }
        };
        match self.backend.set_ex(&key, payload, ttl_seconds).await {
            Ok(()) => tracing::debug!(key = %key, ttl_seconds, "Route cache populated"),
            Err(error) => {
                record_error("set");
                tracing::warn!(key = %key, error = %error, "Route cache write failed");
            }
        }
    }

    /// Drop the entry for one route and date.
    pub async fn invalidate(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) {
        let key = route_key(origin, destination, date);
        if let Err(error) = self.backend.delete(&key).await {
            record_error("delete");
            tracing::warn!(key = %key, error = %error, "Route cache invalidation failed");
        }
    }

    /// Drop every dated entry for a route. Returns the number removed.
    pub async fn invalidate_route(&self, origin: &AirportCode, destination: &AirportCode) -> u64 {
        let pattern = format!("{ROUTE_KEY_PREFIX}:{origin}:{destination}:*");
        self.delete_matching(&pattern).await
    }

    /// Drop every route cache entry. Returns the number removed.
    pub async fn clear(&self) -> u64 {
        let pattern = format!("{ROUTE_KEY_PREFIX}:*");
        self.delete_matching(&pattern).await
    }

    /// Key counts for the backing store and the route cache.
    pub async fn stats(&self) -> CacheStats {
        let total_keys = self.count_matching("*").await;
        let route_cache_keys = self.count_matching(&format!("{ROUTE_KEY_PREFIX}:*")).await;
        CacheStats {
            total_keys,
            route_cache_keys,
        }
    }

    async fn delete_matching(&self, pattern: &str) -> u64 {
        match self.backend.delete_matching(pattern).await {
            Ok(removed) => {
                tracing::info!(pattern, removed, "Route cache entries removed");
                removed
            }
            Err(error) => {
                record_error("delete");
                tracing::warn!(pattern, error = %error, "Route cache bulk delete failed");
                0
            }
        }
    }

    async fn count_matching(&self, pattern: &str) -> u64 {
        match self.backend.count_matching(pattern).await {
            Ok(count) => count,
            Err(error) => {
                record_error("scan");
                tracing::warn!(pattern, error = %error, "Route cache scan failed");
                0
            }
        }
    }
}

fn record_error(operation: &'static str) {
    metrics::counter!(ROUTE_CACHE_ERRORS, "operation" => operation).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MapBackend {
        entries: Arc<Mutex<BTreeMap<String, (String, u64)>>>,
        down: bool,
    }

    impl MapBackend {
        fn check(&self) -> Result<(), CacheError> {
            if self.down {
                Err(CacheError::Unavailable("connection reset".to_string()))
            } else {
                Ok(())
            }
        }

        fn matches(pattern: &str, key: &str) -> bool {
            pattern
                .strip_suffix('*')
                .map_or(pattern == key, |prefix| key.starts_with(prefix))
        }
    }

    impl CacheBackend for MapBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.check()?;
            Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
        }

        async fn set_ex(
            &self,
            key: &str,
            value: String,
            ttl_seconds: u64,
        ) -> Result<(), CacheError> {
            self.check()?;
            self.entries.lock().unwrap().insert(key.to_string(), (value, ttl_seconds));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.check()?;
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
            self.check()?;
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|k, _| !Self::matches(pattern, k));
            Ok((before - entries.len()) as u64)
        }

        async fn count_matching(&self, pattern: &str) -> Result<u64, CacheError> {
            self.check()?;
            let entries = self.entries.lock().unwrap();
            Ok(entries.keys().filter(|k| Self::matches(pattern, k)).count() as u64)
        }
    }

    fn query(origin: &str, destination: &str, day: u32) -> RouteQuery {
        RouteQuery::parse(origin, destination, &format!("2026-06-{day:02}")).unwrap()
    }

    fn empty_result() -> RouteSearchResult {
        RouteSearchResult {
            direct_flights: vec![],
            transit_route: None,
        }
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips_with_ttl() {
        let backend = MapBackend::default();
        let cache = RouteCache::new(backend.clone(), CacheTtlPolicy::default());
        let q = query("DEL", "DXB", 1);

        assert!(cache.get(&q).await.is_none());
        cache.set(&q, &empty_result(), 1800).await;
        assert_eq!(cache.get(&q).await, Some(empty_result()));

        let entries = backend.entries.lock().unwrap();
        assert_eq!(entries.get("routes:DEL:DXB:2026-06-01").unwrap().1, 1800);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_a_miss() {
        let backend = MapBackend::default();
        backend
            .entries
            .lock()
            .unwrap()
            .insert("routes:DEL:DXB:2026-06-01".to_string(), ("{not json".to_string(), 60));
        let cache = RouteCache::new(backend, CacheTtlPolicy::default());
        assert!(cache.get(&query("DEL", "DXB", 1)).await.is_none());
    }

    #[tokio::test]
    async fn test_backend_outage_is_silent() {
        let cache = RouteCache::new(
            MapBackend {
                down: true,
                ..MapBackend::default()
            },
            CacheTtlPolicy::default(),
        );
        let q = query("DEL", "DXB", 1);
        cache.set(&q, &empty_result(), 300).await;
        assert!(cache.get(&q).await.is_none());
        assert_eq!(cache.clear().await, 0);
        assert_eq!(cache.stats().await, CacheStats::default());
    }

    #[tokio::test]
    async fn test_invalidation_scopes() {
        let backend = MapBackend::default();
        backend
            .entries
            .lock()
            .unwrap()
            .insert("session:abc".to_string(), (String::new(), 60));
        let cache = RouteCache::new(backend, CacheTtlPolicy::default());

        for (o, d, day) in [
            ("DEL", "DXB", 1),
            ("DEL", "DXB", 2),
            ("DEL", "DOH", 1),
            ("BOM", "LHR", 3),
        ] {
            cache.set(&query(o, d, day), &empty_result(), 300).await;
        }
        assert_eq!(
            cache.stats().await,
            CacheStats {
                total_keys: 5,
                route_cache_keys: 4
            }
        );

        let del = AirportCode::parse("DEL").unwrap();
        let doh = AirportCode::parse("DOH").unwrap();
        cache
            .invalidate(&del, &doh, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap())
            .await;
        assert!(cache.get(&query("DEL", "DOH", 1)).await.is_none());

        let dxb = AirportCode::parse("DXB").unwrap();
        assert_eq!(cache.invalidate_route(&del, &dxb).await, 2);
        assert_eq!(cache.clear().await, 1);
        assert_eq!(cache.stats().await.total_keys, 1);
    }

    #[test]
    fn test_ttl_boundaries() {
        let policy = CacheTtlPolicy::default();
        assert_eq!(policy.ttl_for(1), 300);
        assert_eq!(policy.ttl_for(2), 1800);
        assert_eq!(policy.ttl_for(30), 3600);
    }
}
