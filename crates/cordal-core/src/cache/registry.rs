//! Named registry of [`NamedCache`] instances, keyed by cache name.

use super::{CacheStats, NamedCache};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity for a cache created on first reference without explicit sizing.
const DEFAULT_MAX_ENTRIES: usize = 10_000;
/// Default TTL for a cache created on first reference without explicit sizing.
const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Owns every [`NamedCache`] in the process, keyed by the name endpoints
/// and invalidation rules reference.
///
/// Grounded on the teacher's use of `dashmap::DashMap` for concurrent
/// named-registry structures (e.g. `EventMatcher`'s index maps).
pub struct CacheRegistry {
    caches: DashMap<String, Arc<NamedCache>>,
}

impl CacheRegistry {
    /// An empty registry; caches are created on first reference.
    #[must_use]
    pub fn new() -> Self {
        Self {
            caches: DashMap::new(),
        }
    }

    /// Return the named cache, creating it with `(max_entries, default_ttl)`
    /// sizing if this is the first reference.
    #[must_use]
    pub fn get_or_create(&self, name: &str, max_entries: usize, default_ttl: Duration) -> Arc<NamedCache> {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(NamedCache::new(max_entries, default_ttl)))
            .clone()
    }

    /// Return the named cache if it already exists, using ambient defaults
    /// rather than creating one sized for a specific endpoint. Used by the
    /// invalidation engine, which only ever reacts to caches endpoints have
    /// already created.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<NamedCache>> {
        self.caches.get(name).map(|c| c.clone())
    }

    /// Return the named cache, creating it with ambient default sizing if absent.
    #[must_use]
    pub fn get_or_create_default(&self, name: &str) -> Arc<NamedCache> {
        self.get_or_create(name, DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }

    /// Names of every cache created so far.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.caches.iter().map(|e| e.key().clone()).collect()
    }

    /// Apply `removePattern` to `targets`, or to every existing cache if
    /// `targets` is empty (the invalidation rule's "broadcast" mode, per spec §4.6 item 3).
    pub fn remove_pattern(&self, pattern: &str, targets: &[String]) {
        if targets.is_empty() {
            for entry in &self.caches {
                entry.value().remove_pattern(pattern);
            }
        } else {
            for name in targets {
                if let Some(cache) = self.caches.get(name) {
                    cache.remove_pattern(pattern);
                }
            }
        }
    }

    /// Clear every cache.
    pub fn clear_all(&self) {
        for entry in &self.caches {
            entry.value().clear();
        }
    }

    /// Sweep expired entries from every cache. Called periodically by the
    /// sweeper task owned by the server crate.
    pub fn sweep_all(&self) {
        for entry in &self.caches {
            entry.value().sweep_expired();
        }
    }

    /// Per-cache statistics for every cache created so far, for the
    /// `/api/metrics/endpoints` surface.
    #[must_use]
    pub fn all_stats(&self) -> Vec<(String, CacheStats)> {
        self.caches
            .iter()
            .map(|e| (e.key().clone(), e.value().stats()))
            .collect()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn broadcast_pattern_removal_hits_every_cache() {
        let registry = CacheRegistry::new();
        let a = registry.get_or_create_default("a");
        let b = registry.get_or_create_default("b");
        a.put("user:1:profile", Value::from("x"), None);
        b.put("user:1:profile", Value::from("y"), None);

        registry.remove_pattern("user:1:*", &[]);

        assert!(a.get("user:1:profile").is_none());
        assert!(b.get("user:1:profile").is_none());
    }

    #[test]
    fn targeted_pattern_removal_spares_other_caches() {
        let registry = CacheRegistry::new();
        let a = registry.get_or_create_default("a");
        let b = registry.get_or_create_default("b");
        a.put("k", Value::from("x"), None);
        b.put("k", Value::from("y"), None);

        registry.remove_pattern("k", &["a".to_string()]);

        assert!(a.get("k").is_none());
        assert!(b.get("k").is_some());
    }
}
