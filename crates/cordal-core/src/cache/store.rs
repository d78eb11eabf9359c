//! `NamedCache`: a single bounded TTL+LRU cache, per spec §4.5.
//!
//! Grounded on the teacher's `cache::result::QueryResultCache`
//! (`lru::LruCache` behind a `parking_lot::Mutex`, with a sibling
//! `CacheMetrics` struct), generalized here to hold arbitrary JSON values
//! instead of query result sets, since a CORDAL cache stores whatever a
//! cached endpoint response or manually-populated entry contains.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

struct CacheEntry {
    value:   Value,
    expires: Instant,
}

/// Point-in-time statistics for one [`NamedCache`], per spec §4.5.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    /// Successful `get` calls against a live entry.
    pub hits: u64,
    /// `get` calls that found no entry or an expired one.
    pub misses: u64,
    /// Entries evicted for capacity (LRU) or expiry (sweep or lazy-on-read).
    pub evictions: u64,
    /// Current entry count.
    pub size: usize,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or `0.0` with no lookups yet.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    stats:   CacheStats,
}

/// A single named, bounded, TTL+LRU cache.
///
/// All operations take a short-held `parking_lot::Mutex`, matching the
/// concurrency model of spec §5 ("cache operations ... must be
/// non-blocking ... or short critical sections").
pub struct NamedCache {
    inner:       Mutex<Inner>,
    default_ttl: Duration,
}

impl NamedCache {
    /// A cache holding at most `max_entries`, with `default_ttl` applied
    /// when [`Self::put`] is called without an explicit TTL.
    #[must_use]
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner:       Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats:   CacheStats::default(),
            }),
            default_ttl,
        }
    }

    /// Look up `key`, refreshing LRU recency on a hit. An expired entry is
    /// treated as a miss and removed (lazy expiry-on-read, per spec §4.5's invariant).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.peek(key) {
            if entry.expires > Instant::now() {
                let value = entry.value.clone();
                inner.entries.promote(key);
                inner.stats.hits += 1;
                return Some(value);
            }
            inner.entries.pop(key);
            inner.stats.evictions += 1;
        }
        inner.stats.misses += 1;
        None
    }

    /// Insert or overwrite `key`, evicting the least-recently-used entry if
    /// at capacity. `value == Value::Null` or an empty `key` are silently
    /// ignored, per spec §4.5.
    pub fn put(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if key.is_empty() || value.is_null() {
            return;
        }
        let mut inner = self.inner.lock();
        let expires = Instant::now() + ttl.unwrap_or(self.default_ttl);
        let evicted = inner
            .entries
            .push(key.to_string(), CacheEntry { value, expires });
        if evicted.is_some() {
            inner.stats.evictions += 1;
        }
        let size = inner.entries.len();
        inner.stats.size = size;
    }

    /// Remove `key` unconditionally.
    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock();
        if inner.entries.pop(key).is_some() {
            inner.stats.size = inner.entries.len();
        }
    }

    /// Remove every key matching glob `pattern` (`*` matches any run of
    /// characters). Atomic with respect to other operations on this cache.
    pub fn remove_pattern(&self, pattern: &str) {
        let Ok(glob) = glob::Pattern::new(pattern) else {
            return;
        };
        let mut inner = self.inner.lock();
        let matching: Vec<String> = inner
            .entries
            .iter()
            .filter(|(k, _)| glob.matches(k))
            .map(|(k, _)| k.clone())
            .collect();
        for key in matching {
            inner.entries.pop(&key);
        }
        inner.stats.size = inner.entries.len();
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats.size = 0;
    }

    /// Evict every entry past its expiry. Run periodically by a background
    /// sweeper in addition to lazy expiry-on-read.
    pub fn sweep_expired(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.entries.pop(key);
        }
        inner.stats.evictions += expired.len() as u64;
        inner.stats.size = inner.entries.len();
    }

    /// A snapshot of current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut inner = self.inner.lock();
        inner.stats.size = inner.entries.len();
        inner.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_least_recently_used() {
        let cache = NamedCache::new(3, Duration::from_secs(60));
        cache.put("k1", Value::from(1), None);
        cache.put("k2", Value::from(2), None);
        cache.put("k3", Value::from(3), None);
        assert!(cache.get("k1").is_some());
        cache.put("k4", Value::from(4), None);

        assert!(cache.get("k2").is_none());
        assert!(cache.get("k1").is_some());
        assert!(cache.get("k3").is_some());
        assert!(cache.get("k4").is_some());
    }

    #[test]
    fn ttl_expiry_is_lazy_on_read() {
        let cache = NamedCache::new(10, Duration::from_millis(10));
        cache.put("k", Value::from("v"), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn null_key_or_value_is_ignored() {
        let cache = NamedCache::new(10, Duration::from_secs(60));
        cache.put("", Value::from(1), None);
        cache.put("k", Value::Null, None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn pattern_removal_matches_glob() {
        let cache = NamedCache::new(10, Duration::from_secs(60));
        cache.put("user:123:profile", Value::from("p"), None);
        cache.put("user:123:settings", Value::from("s"), None);
        cache.put("user:456:profile", Value::from("p2"), None);
        cache.remove_pattern("user:123:*");
        assert!(cache.get("user:123:profile").is_none());
        assert!(cache.get("user:123:settings").is_none());
        assert!(cache.get("user:456:profile").is_some());
    }

    #[test]
    fn hit_rate_reflects_hits_and_misses() {
        let cache = NamedCache::new(10, Duration::from_secs(60));
        cache.put("k", Value::from(1), None);
        cache.get("k");
        cache.get("missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
