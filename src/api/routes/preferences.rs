//! Preference Routes
//!
//! - GET /api/v1/preferences/:page - Dark-mode state of a page
//! - POST /api/v1/preferences/:page/toggle - Flip dark mode

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::PreferenceResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::preferences::UiState;

/// GET /api/v1/preferences/:page
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
) -> ApiResult<Json<PreferenceResponse>> {
    validate_page(&page)?;
    let ui = UiState::load(state.preferences.as_ref(), &page);
    Ok(Json(to_response(ui)))
}

/// POST /api/v1/preferences/:page/toggle
pub async fn toggle_dark_mode(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
) -> ApiResult<Json<PreferenceResponse>> {
    validate_page(&page)?;
    let store = Arc::clone(&state.preferences);

    // File store writes are blocking
    let ui = tokio::task::spawn_blocking(move || {
        let mut ui = UiState::load(store.as_ref(), &page);
        ui.toggle(store.as_ref()).map(|_| ui)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Preference task failed: {}", e)))??;

    Ok(Json(to_response(ui)))
}

fn validate_page(page: &str) -> ApiResult<()> {
    let valid = !page.is_empty()
        && page.len() <= 64
        && page
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("Invalid page name '{}'", page)))
    }
}

fn to_response(ui: UiState) -> PreferenceResponse {
    PreferenceResponse {
        theme: ui.apply(),
        page: ui.page,
        dark_mode: ui.dark_mode,
    }
}
