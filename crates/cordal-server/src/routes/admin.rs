//! Configuration introspection, validation, reload, and metrics endpoints
//! under `/api/generic` and `/api/metrics`.

use crate::app_state::AppState;
use crate::metrics::{self, MetricsSnapshot};
use axum::extract::State;
use axum::Json;
use cordal_core::config::loader::ConfigLoader;
use cordal_core::config::validator::{self, ValidationReport};
use cordal_core::config::{DatabaseDefinition, EndpointDefinition, QueryDefinition};
use serde::Serialize;

/// `GET /api/generic/config/validate` — runs the structural validator
/// (spec §4.2, items 1-5) against the currently live configuration.
pub async fn validate<L: ConfigLoader + 'static>(
    State(state): State<AppState<L>>,
) -> Json<ValidationReport> {
    let report = state
        .history
        .latest()
        .map(|snapshot| validator::validate(&snapshot.config))
        .unwrap_or_default();
    Json(report)
}

/// `GET /api/generic/config/endpoints` — every declared endpoint in the
/// live configuration snapshot (as opposed to `/api/generic/endpoints`,
/// which reflects the compiled, currently-routable registry).
pub async fn config_endpoints<L: ConfigLoader + 'static>(
    State(state): State<AppState<L>>,
) -> Json<Vec<EndpointDefinition>> {
    let endpoints = state
        .history
        .latest()
        .map(|snapshot| snapshot.config.endpoints.into_values().collect())
        .unwrap_or_default();
    Json(endpoints)
}

/// `GET /api/generic/config/queries` — every declared query.
pub async fn config_queries<L: ConfigLoader + 'static>(
    State(state): State<AppState<L>>,
) -> Json<Vec<QueryDefinition>> {
    let queries = state
        .history
        .latest()
        .map(|snapshot| snapshot.config.queries.into_values().collect())
        .unwrap_or_default();
    Json(queries)
}

/// `GET /api/generic/config/databases` — every declared database, with
/// credentials redacted.
pub async fn config_databases<L: ConfigLoader + 'static>(
    State(state): State<AppState<L>>,
) -> Json<Vec<DatabaseDefinition>> {
    let databases = state
        .history
        .latest()
        .map(|snapshot| {
            snapshot
                .config
                .databases
                .into_values()
                .map(|mut db| {
                    db.password = db.password.map(|_| "***".to_string());
                    db
                })
                .collect()
        })
        .unwrap_or_default();
    Json(databases)
}

/// `GET /api/generic/endpoints` — the live, currently-routable endpoint set.
pub async fn endpoints<L: ConfigLoader + 'static>(
    State(state): State<AppState<L>>,
) -> Json<Vec<EndpointDefinition>> {
    Json(state.registry.list())
}

/// `GET /api/metrics/endpoints` — aggregate pool and cache statistics.
pub async fn metrics_endpoints<L: ConfigLoader + 'static>(
    State(state): State<AppState<L>>,
) -> Json<MetricsSnapshot> {
    Json(metrics::collect(&state.pools, &state.caches))
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    success: bool,
    message: String,
    version: Option<String>,
    attempts_exhausted: u32,
}

/// `POST /api/generic/reload` — triggers a reload cycle and reports its outcome.
pub async fn reload<L: ConfigLoader + 'static>(State(state): State<AppState<L>>) -> Json<ReloadResponse> {
    let outcome = state.reload.trigger().await;
    Json(ReloadResponse {
        success: matches!(outcome.state, crate::reload::ReloadState::Watching),
        message: outcome.message,
        version: outcome.version,
        attempts_exhausted: state.reload.attempts_exhausted(),
    })
}
