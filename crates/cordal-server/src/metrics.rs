//! Aggregated pool and cache statistics for `GET /api/metrics/endpoints`.

use cordal_core::cache::{CacheRegistry, CacheStats};
use cordal_core::pool::{PoolManager, PoolMetrics};
use serde::Serialize;

/// One database's pool occupancy, by name.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseMetrics {
    /// Database name.
    pub name: String,
    /// Pool occupancy, or `None` if no pool has been created yet.
    pub pool: Option<PoolMetrics>,
}

/// One cache's statistics, by name.
#[derive(Debug, Clone, Serialize)]
pub struct CacheMetricsEntry {
    /// Cache name.
    pub name: String,
    /// Point-in-time statistics.
    pub stats: CacheStats,
}

/// The full aggregate served by `/api/metrics/endpoints`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Per-database pool occupancy.
    pub databases: Vec<DatabaseMetrics>,
    /// Per-cache statistics.
    pub caches: Vec<CacheMetricsEntry>,
}

/// Collect a fresh snapshot from the live pool manager and cache registry.
#[must_use]
pub fn collect(pools: &PoolManager, caches: &CacheRegistry) -> MetricsSnapshot {
    let databases = pools
        .database_names()
        .into_iter()
        .map(|name| {
            let pool = pools.metrics(&name);
            DatabaseMetrics { name, pool }
        })
        .collect();

    let caches = caches
        .all_stats()
        .into_iter()
        .map(|(name, stats)| CacheMetricsEntry { name, stats })
        .collect();

    MetricsSnapshot { databases, caches }
}
