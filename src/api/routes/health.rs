//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (scheduler running)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;
use crate::dashboard::PanelOutcome;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the refresh scheduler is running.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.scheduler.is_running().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let running = state.scheduler.is_running().await;
    let statuses = state.scheduler.get_status().await;

    let panels_total = statuses.len();
    let panels_failing = statuses
        .iter()
        .filter(|(_, s)| matches!(s.last_outcome, Some(PanelOutcome::Failed { .. })))
        .count();

    let status = if !running {
        "unhealthy"
    } else if panels_failing > 0 {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        scheduler: if running { "running" } else { "stopped" }.to_string(),
        panels_total,
        panels_rendered: state.board.len().await,
        panels_failing,
        markers: state.map.len().await,
        ws_connections: state.ws_connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
