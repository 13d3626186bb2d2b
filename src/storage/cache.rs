// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TTL-bounded LRU cache regions.
//!
//! The realm keeps two independent regions, `authentication_cache` and
//! `authorization_cache`, each with its own TTL. Callers treat every
//! [`CacheError`] as "bypass the cache", never as a request failure.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Name of the region holding `AuthenticationInfo` entries.
pub const AUTHENTICATION_CACHE: &str = "authentication_cache";

/// Name of the region holding `AuthorizationInfo` entries.
pub const AUTHORIZATION_CACHE: &str = "authorization_cache";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache region `{0}` requires a non-zero capacity")]
    InvalidCapacity(String),

    #[error("cache region `{0}` is unavailable")]
    Unavailable(String),
}

/// Key → value store with per-entry expiry.
///
/// Implementations must be safe to share across request tasks. Operations on
/// one key are last-write-wins; nothing is promised across keys.
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    fn put(&self, key: &str, value: V) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;
}

/// Cached value + insertion timestamp.
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-process LRU region with a fixed TTL.
pub struct TtlCache<V> {
    name: String,
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a region with the given capacity and TTL.
    ///
    /// A zero capacity is a configuration defect and fails here, at startup.
    pub fn new(name: impl Into<String>, capacity: usize, ttl: Duration) -> Result<Self, CacheError> {
        let name = name.into();
        let capacity =
            NonZeroUsize::new(capacity).ok_or_else(|| CacheError::InvalidCapacity(name.clone()))?;
        Ok(Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn unavailable(&self) -> CacheError {
        CacheError::Unavailable(self.name.clone())
    }
}

impl<V: Clone + Send> Cache<V> for TtlCache<V> {
    /// Returns `None` if not cached or expired.
    fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| self.unavailable())?;
        if let Some(entry) = entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Ok(Some(entry.value.clone()));
            }
            // Expired, drop the entry
            entries.pop(key);
        }
        Ok(None)
    }

    fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| self.unavailable())?;
        entries.put(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| self.unavailable())?;
        entries.pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| self.unavailable())?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn region(ttl: Duration) -> TtlCache<String> {
        TtlCache::new(AUTHENTICATION_CACHE, 10, ttl).unwrap()
    }

    #[test]
    fn cache_put_and_get() {
        let cache = region(Duration::from_secs(300));
        assert!(cache.get("alice").unwrap().is_none());

        cache.put("alice", "hash-a".to_string()).unwrap();

        assert_eq!(cache.get("alice").unwrap().as_deref(), Some("hash-a"));
    }

    #[test]
    fn cache_remove() {
        let cache = region(Duration::from_secs(300));
        cache.put("alice", "hash-a".to_string()).unwrap();
        cache.remove("alice").unwrap();
        assert!(cache.get("alice").unwrap().is_none());
    }

    #[test]
    fn cache_clear() {
        let cache = region(Duration::from_secs(300));
        cache.put("alice", "a".to_string()).unwrap();
        cache.put("bob", "b".to_string()).unwrap();
        cache.clear().unwrap();
        assert!(cache.get("alice").unwrap().is_none());
        assert!(cache.get("bob").unwrap().is_none());
    }

    #[test]
    fn cache_ttl_expiry() {
        let cache = region(Duration::from_millis(1));
        cache.put("alice", "hash-a".to_string()).unwrap();

        // Wait for TTL to expire
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("alice").unwrap().is_none());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = TtlCache::<String>::new(AUTHORIZATION_CACHE, 0, Duration::from_secs(1));
        assert!(matches!(result, Err(CacheError::InvalidCapacity(name)) if name == AUTHORIZATION_CACHE));
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = TtlCache::new("tiny", 2, Duration::from_secs(60)).unwrap();
        cache.put("a", 1).unwrap();
        cache.put("b", 2).unwrap();
        cache.get("a").unwrap();
        cache.put("c", 3).unwrap();

        assert_eq!(cache.get("a").unwrap(), Some(1));
        assert!(cache.get("b").unwrap().is_none());
        assert_eq!(cache.get("c").unwrap(), Some(3));
    }

    #[test]
    fn concurrent_writers_keep_region_consistent() {
        let cache = Arc::new(TtlCache::new("shared", 128, Duration::from_secs(60)).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("k{}", i % 10);
                        cache.put(&key, t * 100 + i).unwrap();
                        let _ = cache.get(&key).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for i in 0..10 {
            assert!(cache.get(&format!("k{i}")).unwrap().is_some());
        }
    }
}
