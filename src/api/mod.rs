//! QuakeWatch REST API
//!
//! HTTP API layer for QuakeWatch, built with Axum.
//!
//! # Endpoints
//!
//! ## Panels
//! - `GET /api/v1/panels` - List panels with status (`?section=earth|mars|moon`)
//! - `GET /api/v1/panels/:id` - Latest rendered figure
//! - `POST /api/v1/refresh` - Run one refresh tick now
//!
//! ## Map
//! - `GET /api/v1/map` - Viewport and current markers
//!
//! ## Preferences
//! - `GET /api/v1/preferences/:page` - Dark-mode state
//! - `POST /api/v1/preferences/:page/toggle` - Flip dark mode
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/v1/ws` and `GET /ws` - Live panel, map and tick events

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Panel routes
        .route("/panels", get(routes::panels::list_panels))
        .route("/panels/:id", get(routes::panels::get_panel))
        .route("/refresh", post(routes::panels::refresh))
        // Map routes
        .route("/map", get(routes::map::get_map))
        // Preference routes
        .route("/preferences/:page", get(routes::preferences::get_preferences))
        .route(
            "/preferences/:page/toggle",
            post(routes::preferences::toggle_dark_mode),
        )
        // WebSocket route
        .route("/ws", get(websocket_handler));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("QuakeWatch API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("QuakeWatch API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{RefreshScheduler, SchedulerConfig, SurfaceBoard};
    use crate::map::{Marker, MarkerLayer};
    use crate::pipeline::Reading;
    use crate::preferences::MemoryStore;
    use crate::sources::{Body, ReadingSource, SourceError, SyntheticSource, Window};
    use crate::websocket::{ConnectionHub, HubConfig};
    use async_trait::async_trait;
    use axum::{
        body::Body as HttpBody,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    /// Earth feed that is always down
    struct OfflineEarth;

    #[async_trait]
    impl ReadingSource for OfflineEarth {
        fn name(&self) -> &str {
            "offline"
        }

        fn body(&self) -> Body {
            Body::Earth
        }

        async fn fetch(&self, _window: Window) -> Result<Vec<Reading>, SourceError> {
            Err(SourceError::Network("connection refused".to_string()))
        }
    }

    fn create_test_state() -> AppState {
        let hub = Arc::new(ConnectionHub::new(HubConfig::default()));
        let board = Arc::new(SurfaceBoard::with_hub(Arc::clone(&hub)));
        let map = Arc::new(MarkerLayer::with_hub(Arc::clone(&hub)));
        let scheduler = Arc::new(
            RefreshScheduler::new(board.clone(), SchedulerConfig::default())
                .with_source(Arc::new(OfflineEarth))
                .with_source(Arc::new(SyntheticSource::mars().with_seed(1)))
                .with_source(Arc::new(SyntheticSource::moon().with_seed(2)))
                .with_hub(Arc::clone(&hub)),
        );

        AppState::new(
            board,
            map,
            scheduler,
            Arc::new(MemoryStore::new()),
            hub,
            ApiConfig::default(),
        )
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(HttpBody::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = build_router(create_test_state());
        let (status, _) = send(&app, "GET", "/health/live").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_requires_running_scheduler() {
        let app = build_router(create_test_state());
        let (status, _) = send(&app, "GET", "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = build_router(create_test_state());
        let (status, body) = send(&app, "GET", "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scheduler"], "stopped");
        assert_eq!(body["panels_total"], 9);
    }

    #[tokio::test]
    async fn test_list_panels() {
        let app = build_router(create_test_state());
        let (status, body) = send(&app, "GET", "/api/v1/panels").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 9);
        assert_eq!(body["panels"][0]["id"], "earth-1min");
        assert_eq!(body["panels"][0]["title"], "Earthquakes - Last 5 Hour(s)");
        assert!(body.get("sections").is_none());
    }

    #[tokio::test]
    async fn test_list_panels_by_section() {
        let app = build_router(create_test_state());
        let (status, body) = send(&app, "GET", "/api/v1/panels?section=moon").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["panels"][2]["id"], "moon-1hour");
        assert_eq!(body["sections"][2]["visible"], true);
        assert_eq!(body["sections"][0]["visible"], false);

        let (status, body) = send(&app, "GET", "/api/v1/panels?section=pluto").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_panel_not_found_until_rendered() {
        let app = build_router(create_test_state());

        let (status, _) = send(&app, "GET", "/api/v1/panels/mars-1min").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/api/v1/panels/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_isolates_failures() {
        let app = build_router(create_test_state());

        let (status, body) = send(&app, "POST", "/api/v1/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rendered"], 6);
        assert_eq!(body["failed"], 3);

        let (status, body) = send(&app, "GET", "/api/v1/panels/mars-1min").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["points"], 60);
        assert_eq!(body["figure"]["data"][0]["type"], "scatter");
        assert_eq!(body["figure"]["layout"]["title"], "Marsquakes - Last 5 Hour(s)");

        let (status, _) = send(&app, "GET", "/api/v1/panels/earth-1min").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, "GET", "/health").await;
        assert_eq!(body["panels_failing"], 3);
        assert_eq!(body["panels_rendered"], 6);
    }

    #[tokio::test]
    async fn test_map() {
        let state = create_test_state();
        state.map.add(Marker::for_event(20.0, 10.0, 4.2)).await;
        let app = build_router(state);

        let (status, body) = send(&app, "GET", "/api/v1/map").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view"]["zoom"], 2);
        assert_eq!(body["total"], 1);
        assert_eq!(body["markers"][0]["lat"], 20.0);
        assert_eq!(body["markers"][0]["lon"], 10.0);
    }

    #[tokio::test]
    async fn test_dark_mode_toggle() {
        let app = build_router(create_test_state());

        let (status, body) = send(&app, "GET", "/api/v1/preferences/index").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dark_mode"], false);
        assert_eq!(body["theme"]["toggle_icon"], "🌙");

        let (status, body) = send(&app, "POST", "/api/v1/preferences/index/toggle").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dark_mode"], true);
        assert_eq!(body["theme"]["body_class"], "dark-mode");

        let (_, body) = send(&app, "GET", "/api/v1/preferences/index").await;
        assert_eq!(body["dark_mode"], true);

        let (_, body) = send(&app, "GET", "/api/v1/preferences/seismic").await;
        assert_eq!(body["dark_mode"], false);
    }
}
