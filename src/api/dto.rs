//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dashboard::{PanelReport, PanelStatus};
use crate::map::{MapView, MarkerHandle};
use crate::pipeline::ChartFigure;
use crate::preferences::{AppliedTheme, SectionDisplay};
use crate::sources::Body;

// ============================================
// PANEL DTOs
// ============================================

/// Query parameters for the panel list
#[derive(Debug, Default, Deserialize)]
pub struct PanelListParams {
    /// Only panels of this body: earth, mars or moon
    pub section: Option<String>,
}

/// One panel with its scheduler status
#[derive(Debug, Serialize)]
pub struct PanelSummary {
    pub id: String,
    pub body: Body,
    pub title: String,
    pub lookback_minutes: u32,
    pub interval_minutes: u32,
    pub status: PanelStatus,
}

/// Panel list response
#[derive(Debug, Serialize)]
pub struct PanelListResponse {
    pub panels: Vec<PanelSummary>,
    pub total: usize,
    /// Present when filtered by section
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionDisplay>>,
}

/// Latest figure of one panel
#[derive(Debug, Serialize)]
pub struct PanelFigureResponse {
    pub id: String,
    pub title: String,
    pub rendered_at: DateTime<Utc>,
    pub points: usize,
    pub figure: ChartFigure,
}

// ============================================
// REFRESH DTOs
// ============================================

/// Outcome of a manual refresh tick
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub rendered: usize,
    pub failed: usize,
    pub skipped: usize,
    pub reports: Vec<PanelReport>,
}

// ============================================
// MAP DTOs
// ============================================

/// Map viewport plus current markers
#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub view: MapView,
    pub markers: Vec<MarkerHandle>,
    pub total: usize,
}

// ============================================
// PREFERENCE DTOs
// ============================================

/// Dark-mode state of a page and what it applies
#[derive(Debug, Serialize)]
pub struct PreferenceResponse {
    pub page: String,
    pub dark_mode: bool,
    pub theme: AppliedTheme,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// healthy, degraded or unhealthy
    pub status: String,
    /// running or stopped
    pub scheduler: String,
    pub panels_total: usize,
    pub panels_rendered: usize,
    pub panels_failing: usize,
    pub markers: usize,
    pub ws_connections: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
