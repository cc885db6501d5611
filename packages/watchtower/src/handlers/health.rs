use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
///
/// Reports `degraded` while the most recent pane listing failed.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let panes = state.registry.len().await as u64;
    let status = if state.collector_stats.is_list_failing() {
        "degraded"
    } else {
        "healthy"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        clients: state.hub.client_count(),
        panes,
        uptime_secs: state.metrics.uptime_secs(),
    })
}

/// Metrics endpoint - returns server and collector counters
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot(state.collector_stats.snapshot()))
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
