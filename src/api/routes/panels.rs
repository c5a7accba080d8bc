//! Panel Routes
//!
//! - GET /api/v1/panels - List panels with status, optionally by section
//! - GET /api/v1/panels/:id - Latest rendered figure of a panel
//! - POST /api/v1/refresh - Run one tick now and wait for it

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    PanelFigureResponse, PanelListParams, PanelListResponse, PanelSummary, RefreshResponse,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::preferences::section_visibility;
use crate::sources::Body;

/// GET /api/v1/panels
pub async fn list_panels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PanelListParams>,
) -> ApiResult<Json<PanelListResponse>> {
    let section = params
        .section
        .as_deref()
        .map(|s| s.parse::<Body>())
        .transpose()
        .map_err(ApiError::Validation)?;

    let panels: Vec<PanelSummary> = state
        .scheduler
        .get_status()
        .await
        .into_iter()
        .filter(|(panel, _)| section.map_or(true, |body| panel.body == body))
        .map(|(panel, status)| PanelSummary {
            title: panel.title(),
            id: panel.id,
            body: panel.body,
            lookback_minutes: panel.lookback_minutes,
            interval_minutes: panel.interval_minutes,
            status,
        })
        .collect();

    Ok(Json(PanelListResponse {
        total: panels.len(),
        panels,
        sections: section.map(section_visibility),
    }))
}

/// GET /api/v1/panels/:id
pub async fn get_panel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PanelFigureResponse>> {
    let spec = state
        .scheduler
        .panel(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Panel '{}' does not exist", id)))?;

    let rendered = state
        .board
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Panel '{}' has not been rendered yet", id)))?;

    Ok(Json(PanelFigureResponse {
        title: spec.title(),
        id,
        rendered_at: rendered.rendered_at,
        points: rendered.points,
        figure: rendered.figure,
    }))
}

/// POST /api/v1/refresh
pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    tracing::info!("Manual refresh requested");
    let summary = state.scheduler.run_tick().await;

    Json(RefreshResponse {
        rendered: summary.rendered(),
        failed: summary.failed(),
        skipped: summary.skipped(),
        reports: summary.reports,
    })
}
