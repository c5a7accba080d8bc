//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::dashboard::{RefreshScheduler, SurfaceBoard};
use crate::map::{MapView, MarkerLayer};
use crate::preferences::PreferenceStore;
use crate::websocket::ConnectionHub;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Latest figure per panel
    pub board: Arc<SurfaceBoard>,
    /// Markers from the most recent successful feed fetch
    pub map: Arc<MarkerLayer>,
    /// Initial map viewport
    pub map_view: MapView,
    /// Refresh scheduler driving the panels
    pub scheduler: Arc<RefreshScheduler>,
    /// Per-page UI preferences
    pub preferences: Arc<dyn PreferenceStore>,
    /// WebSocket connection hub for live updates
    pub ws_hub: Arc<ConnectionHub>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        board: Arc<SurfaceBoard>,
        map: Arc<MarkerLayer>,
        scheduler: Arc<RefreshScheduler>,
        preferences: Arc<dyn PreferenceStore>,
        ws_hub: Arc<ConnectionHub>,
        config: ApiConfig,
    ) -> Self {
        Self {
            board,
            map,
            map_view: MapView::default(),
            scheduler,
            preferences,
            ws_hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8086,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&crate::config::ApiConfig> for ApiConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}
