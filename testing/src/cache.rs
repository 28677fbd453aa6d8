//! In-memory cache backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use freightline_core::{CacheError, cache::CacheBackend};

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<BTreeMap<String, (String, u64)>>,
    down: AtomicBool,
    writes: AtomicUsize,
}

/// Process-local [`CacheBackend`] that records TTLs but never expires.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<Inner>,
}

impl InMemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command fail until switched back.
    pub fn set_down(&self, down: bool) {
        self.inner.down.store(down, Ordering::SeqCst);
    }

    /// TTL recorded for `key`.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.entries().get(key).map(|(_, ttl)| *ttl)
    }

    /// Raw payload stored under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries().get(key).map(|(value, _)| value.clone())
    }

    /// Store a raw payload directly, bypassing the route cache.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries()
            .insert(key.to_string(), (value.to_string(), 0));
    }

    /// Number of successful writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, (String, u64)>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.inner.down.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Glob match where `*` matches any run of characters.
fn glob_matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return key.is_empty();
    };
    let Some(mut rest) = key.strip_prefix(head) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError> {
        self.check()?;
        self.entries().insert(key.to_string(), (value, ttl_seconds));
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries().remove(key);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        self.check()?;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !glob_matches(pattern, key));
        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }

    async fn count_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        self.check()?;
        let count = self
            .entries()
            .keys()
            .filter(|key| glob_matches(pattern, key))
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::glob_matches;

    #[test]
    fn test_glob_matching() {
        assert!(glob_matches("*", "anything"));
        assert!(glob_matches("routes:*", "routes:DEL:DXB:2026-06-01"));
        assert!(glob_matches("routes:DEL:DXB:*", "routes:DEL:DXB:2026-06-01"));
        assert!(!glob_matches("routes:DEL:DXB:*", "routes:DEL:DOH:2026-06-01"));
        assert!(glob_matches("routes:*:2026-06-01", "routes:DEL:DXB:2026-06-01"));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("exact", "exactly"));
    }
}
