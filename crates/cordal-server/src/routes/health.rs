//! `GET /api/health`.

use crate::app_state::AppState;
use axum::extract::State;
use axum::Json;
use cordal_core::config::loader::ConfigLoader;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    uptime_seconds: u64,
}

/// Liveness/readiness probe. Always returns `200` once the process is
/// serving; degraded database/cache state is surfaced via `/api/metrics/endpoints`
/// rather than failing this check, so a load balancer does not pull a node
/// whose databases are merely slow to reconnect.
pub async fn health<L: ConfigLoader + 'static>(State(state): State<AppState<L>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        service: "cordal",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
