//! Reload Orchestrator (C11): watcher → reload → validate → atomic swap or rollback.

use crate::registry::EndpointRegistry;
use cordal_core::config::loader::ConfigLoader;
use cordal_core::config::validator;
use cordal_core::pool::PoolManager;
use cordal_core::snapshot::SnapshotHistory;
use cordal_error::{CordalError, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The reload state machine's current phase, per spec §4.11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// No reload in progress; the live snapshot is stable.
    Idle,
    /// Loading definitions from the configured source.
    Loading,
    /// Running the configuration validator against the freshly-loaded set.
    Validating,
    /// Building the shadow registry and pool updates and swapping them in.
    Applying,
    /// Idle after a successful reload; distinguished from `Idle` only for observability.
    Watching,
    /// Reverting to the previous live snapshot after a failure during `Applying`.
    RollingBack,
    /// Bounded retries were exhausted; the previous live state is preserved.
    Failed,
}

/// Outcome of one `trigger` call.
#[derive(Debug, Clone)]
pub struct ReloadOutcome {
    /// The state the orchestrator ended this cycle in.
    pub state: ReloadState,
    /// The version string of the live snapshot after this cycle.
    pub version: Option<String>,
    /// Human-readable summary, surfaced by `POST /api/generic/reload`.
    pub message: String,
}

/// Drives the full configuration reload pipeline.
///
/// A single `tokio::sync::Mutex` (the "`reloading`" mutex of spec §4.11
/// step 1) serializes reload cycles; a concurrent trigger while one is
/// already running is coalesced rather than queued without bound, matching
/// "queue at most one follow-up".
pub struct ReloadOrchestrator<L: ConfigLoader> {
    loader: L,
    pools: Arc<PoolManager>,
    registry: Arc<EndpointRegistry>,
    history: Arc<SnapshotHistory>,
    state: Mutex<ReloadState>,
    reloading: Mutex<()>,
    max_attempts: u32,
    attempts_exhausted: AtomicU32,
}

impl<L: ConfigLoader> ReloadOrchestrator<L> {
    /// Build an orchestrator over `loader`, driving `pools` and `registry`,
    /// retaining history in `history`.
    #[must_use]
    pub fn new(
        loader: L,
        pools: Arc<PoolManager>,
        registry: Arc<EndpointRegistry>,
        history: Arc<SnapshotHistory>,
        max_attempts: u32,
    ) -> Self {
        Self {
            loader,
            pools,
            registry,
            history,
            state: Mutex::new(ReloadState::Idle),
            reloading: Mutex::new(()),
            max_attempts: max_attempts.max(1),
            attempts_exhausted: AtomicU32::new(0),
        }
    }

    /// Current phase, for the `/api/health` and reload-status surfaces.
    pub async fn current_state(&self) -> ReloadState {
        *self.state.lock().await
    }

    /// How many times this orchestrator has given up on a reload cycle after
    /// exhausting `max_attempts`, for the `/api/generic/reload` surface.
    pub fn attempts_exhausted(&self) -> u32 {
        self.attempts_exhausted.load(Ordering::Relaxed)
    }

    async fn set_state(&self, new: ReloadState) {
        let mut guard = self.state.lock().await;
        tracing::info!(from = ?*guard, to = ?new, "reload transition");
        *guard = new;
    }

    /// Run one reload cycle: load, validate, compute delta, build a shadow
    /// registry, and swap. On failure during apply, roll back to the
    /// previous live snapshot. Retries transient failures up to
    /// `max_attempts` times before giving up with `Failed`.
    pub async fn trigger(&self) -> ReloadOutcome {
        let Ok(_permit) = self.reloading.try_lock() else {
            return ReloadOutcome {
                state: self.current_state().await,
                version: self.history.latest().map(|s| s.version),
                message: "a reload is already in progress".to_string(),
            };
        };

        let mut last_error: Option<CordalError> = None;
        for attempt in 1..=self.max_attempts {
            match self.run_once().await {
                Ok(outcome) => return outcome,
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "reload cycle failed, retrying");
                    last_error = Some(err);
                }
            }
        }

        self.set_state(ReloadState::Failed).await;
        self.attempts_exhausted.fetch_add(1, Ordering::Relaxed);
        ReloadOutcome {
            state: ReloadState::Failed,
            version: self.history.latest().map(|s| s.version),
            message: last_error.map_or_else(|| "reload failed".to_string(), |e| e.to_string()),
        }
    }

    async fn run_once(&self) -> Result<ReloadOutcome> {
        self.set_state(ReloadState::Loading).await;
        let new_config = self.loader.load().await?;

        self.set_state(ReloadState::Validating).await;
        let report = validator::validate(&new_config);
        if !report.is_valid() {
            self.set_state(ReloadState::Idle).await;
            return Err(CordalError::ConfigInvalid {
                message: format!("{} validation error(s)", report.errors.len()),
            });
        }

        self.set_state(ReloadState::Applying).await;
        let previous = self.history.latest();

        let apply_result = self.apply(&new_config).await;
        match apply_result {
            Ok(()) => {
                let version = self.history.snapshot(new_config, now_millis());
                self.set_state(ReloadState::Watching).await;
                Ok(ReloadOutcome {
                    state: ReloadState::Watching,
                    version: Some(version),
                    message: "reload succeeded".to_string(),
                })
            }
            Err(err) => {
                self.set_state(ReloadState::RollingBack).await;
                if let Some(previous) = previous {
                    self.registry
                        .swap(previous.config.endpoints.values().cloned().collect());
                    self.pools.update_pools(&previous.config.databases);
                }
                self.set_state(ReloadState::Watching).await;
                Err(err)
            }
        }
    }

    async fn apply(&self, config: &cordal_core::ConfigSet) -> Result<()> {
        self.registry.swap(config.endpoints.values().cloned().collect());
        self.pools.update_pools(&config.databases);
        Ok(())
    }
}

fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cordal_core::config::{
        DatabaseDefinition, EndpointDefinition, HttpMethod, ParamSource, PoolParameters,
        QueryDefinition, QueryParameter, ScalarType,
    };
    use cordal_core::ConfigSet;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    struct FixedLoader {
        config: ConfigSet,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ConfigLoader for FixedLoader {
        async fn load(&self) -> Result<ConfigSet> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CordalError::ParseError {
                    location: "fixture".into(),
                    message:  "forced failure".into(),
                });
            }
            Ok(self.config.clone())
        }
    }

    fn sample_config() -> ConfigSet {
        let mut databases = HashMap::new();
        databases.insert(
            "primary".to_string(),
            DatabaseDefinition {
                name: "primary".into(),
                url: "postgres://localhost/test".into(),
                driver: "postgresql".into(),
                username: None,
                password: None,
                pool: PoolParameters::default(),
                description: None,
            },
        );
        let mut queries = HashMap::new();
        queries.insert(
            "find_user".to_string(),
            QueryDefinition {
                name: "find_user".into(),
                database_name: "primary".into(),
                sql: "SELECT * FROM users WHERE id = ?".into(),
                parameters: vec![QueryParameter {
                    name: "id".into(),
                    scalar_type: ScalarType::Long,
                    required: true,
                    default_value: None,
                    source: ParamSource::Path,
                }],
                timeout_seconds: 30,
                description: None,
            },
        );
        let mut endpoints = HashMap::new();
        endpoints.insert(
            "find_user".to_string(),
            EndpointDefinition {
                name: "find_user".into(),
                path: "/api/users/{id}".into(),
                method: HttpMethod::Get,
                query_name: "find_user".into(),
                count_query_name: None,
                pagination: None,
                cache: None,
                response_shape: None,
                description: None,
            },
        );
        ConfigSet {
            databases,
            queries,
            endpoints,
        }
    }

    #[tokio::test]
    async fn successful_reload_publishes_new_snapshot() {
        let loader = FixedLoader {
            config: sample_config(),
            fail:   AtomicBool::new(false),
        };
        let orchestrator = ReloadOrchestrator::new(
            loader,
            Arc::new(PoolManager::new()),
            Arc::new(EndpointRegistry::new(Vec::new())),
            Arc::new(SnapshotHistory::new(10)),
            3,
        );

        let outcome = orchestrator.trigger().await;
        assert_eq!(outcome.state, ReloadState::Watching);
        assert!(outcome.version.is_some());
    }

    #[tokio::test]
    async fn exhausted_retries_yield_failed_state() {
        let loader = FixedLoader {
            config: sample_config(),
            fail:   AtomicBool::new(true),
        };
        let orchestrator = ReloadOrchestrator::new(
            loader,
            Arc::new(PoolManager::new()),
            Arc::new(EndpointRegistry::new(Vec::new())),
            Arc::new(SnapshotHistory::new(10)),
            2,
        );

        let outcome = orchestrator.trigger().await;
        assert_eq!(outcome.state, ReloadState::Failed);
    }
}
