//! Map Routes
//!
//! - GET /api/v1/map - Viewport plus the markers of the last feed fetch

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::MapResponse;
use crate::api::state::AppState;

/// GET /api/v1/map
pub async fn get_map(State(state): State<Arc<AppState>>) -> Json<MapResponse> {
    let markers = state.map.markers().await;

    Json(MapResponse {
        view: state.map_view.clone(),
        total: markers.len(),
        markers,
    })
}
