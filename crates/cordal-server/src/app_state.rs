//! Shared application state wiring every CORDAL component together for axum handlers.

use crate::registry::EndpointRegistry;
use crate::reload::ReloadOrchestrator;
use cordal_core::cache::CacheRegistry;
use cordal_core::config::loader::ConfigLoader;
use cordal_core::pool::PoolManager;
use cordal_core::query::QueryExecutor;
use cordal_core::snapshot::SnapshotHistory;
use cordal_events::{EventBus, InvalidationEngine};
use std::sync::Arc;
use std::time::Instant;

/// Everything a request handler needs, cloned cheaply (every field is an `Arc`).
#[derive(Clone)]
pub struct AppState<L: ConfigLoader> {
    /// C7 — the live, hot-swappable routing table.
    pub registry: Arc<EndpointRegistry>,
    /// C3 — per-database connection pools.
    pub pools: Arc<PoolManager>,
    /// C4 — binds and executes named queries.
    pub executor: Arc<QueryExecutor>,
    /// C5 — named response/result caches.
    pub caches: Arc<CacheRegistry>,
    /// C6 — publishes domain events for cache invalidation.
    pub events: Arc<EventBus>,
    /// C6 — reacts to events by invalidating cache patterns.
    pub invalidation: Arc<InvalidationEngine>,
    /// C10 — bounded history of configuration snapshots.
    pub history: Arc<SnapshotHistory>,
    /// C11 — drives load/validate/apply/rollback cycles.
    pub reload: Arc<ReloadOrchestrator<L>>,
    /// Process start time, for the uptime field on `/api/health`.
    pub started_at: Instant,
}
