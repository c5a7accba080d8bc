//! QuakeWatch Dashboard
//!
//! Wires sources, the pipeline and the chart surface together:
//!
//! - **panel**: the nine (body, lookback, interval) chart definitions
//! - **board**: in-memory chart surface holding the latest figures
//! - **scheduler**: periodic, failure-isolated refresh of every panel

pub mod board;
pub mod panel;
pub mod scheduler;

pub use board::{RenderedPanel, SurfaceBoard};
pub use panel::PanelSpec;
pub use scheduler::{
    PanelOutcome, PanelReport, PanelStatus, RefreshScheduler, SchedulerConfig, TickSummary,
};
