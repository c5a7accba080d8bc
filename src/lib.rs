//! # QuakeWatch
//!
//! Seismic dashboard service: polls the USGS event catalog (plus synthetic
//! Mars and Moon feeds), buckets readings by interval and keeps nine chart
//! panels and a quake map current.
//!
//! ## Features
//!
//! - **Interval bucketing**: maximum magnitude per fixed time slot
//! - **Isolated refresh**: each panel refreshes as its own task every minute
//! - **Live updates**: WebSocket push of figures, markers and tick summaries
//! - **UI preferences**: per-page dark mode persisted to a JSON file
//!
//! ## Modules
//!
//! - [`pipeline`]: readings, bucketizer and chart figures
//! - [`sources`]: USGS, synthetic and CSV reading sources
//! - [`dashboard`]: panels, chart board and refresh scheduler
//! - [`map`]: quake map marker registry
//! - [`preferences`]: dark-mode toggle and section visibility
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quakewatch::dashboard::{RefreshScheduler, SchedulerConfig, SurfaceBoard};
//! use quakewatch::sources::SyntheticSource;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let board = Arc::new(SurfaceBoard::new());
//!     let scheduler = RefreshScheduler::new(board.clone(), SchedulerConfig::default())
//!         .with_source(Arc::new(SyntheticSource::mars()))
//!         .with_source(Arc::new(SyntheticSource::moon()));
//!
//!     let summary = scheduler.run_tick().await;
//!     println!("{} panels rendered", summary.rendered());
//!
//!     if let Some(panel) = board.get("mars-1hour").await {
//!         println!("{} points", panel.points);
//!     }
//! }
//! ```

pub mod api;
pub mod config;
pub mod dashboard;
pub mod map;
pub mod pipeline;
pub mod preferences;
pub mod sources;
pub mod websocket;

// Re-export top-level types for convenience
pub use pipeline::{
    bucketize, render, Bucket, BucketInterval, ChartFigure, ChartSurface, Reading, Series,
    SeriesOrder,
};

pub use sources::{
    Body, CsvSource, ReadingSource, SourceError, SyntheticSource, UsgsConfig, UsgsFeed, Window,
};

pub use dashboard::{
    PanelOutcome, PanelSpec, PanelStatus, RefreshScheduler, RenderedPanel, SchedulerConfig,
    SurfaceBoard, TickSummary,
};

pub use map::{MapView, Marker, MarkerHandle, MarkerLayer};

pub use preferences::{
    section_visibility, AppliedTheme, FileStore, MemoryStore, PreferenceError, PreferenceStore,
    UiState,
};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use websocket::{
    websocket_handler, ClientMessage, ConnectionHub, HubConfig, HubError, ServerMessage, WsEvent,
};

pub use config::{Config, ConfigError, LoggingConfig};
