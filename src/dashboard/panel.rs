//! Panel definitions
//!
//! A panel is one (source body, lookback window, interval) combination
//! rendered to its own chart target.

use serde::{Deserialize, Serialize};

use crate::sources::{Body, Window};

/// One chart on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    /// Chart target id (e.g. "earth-1min")
    pub id: String,
    pub body: Body,
    pub lookback_minutes: u32,
    pub interval_minutes: u32,
    /// Overrides the generated title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl PanelSpec {
    pub fn new(id: impl Into<String>, body: Body, lookback_minutes: u32, interval_minutes: u32) -> Self {
        Self {
            id: id.into(),
            body,
            lookback_minutes,
            interval_minutes,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn window(&self) -> Window {
        Window::new(self.lookback_minutes, self.interval_minutes)
    }

    /// Chart title, e.g. "Marsquakes - Last 24 Hour(s)"
    pub fn title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!(
                "{} - Last {} Hour(s)",
                self.body.quake_label(),
                f64::from(self.lookback_minutes) / 60.0
            ),
        }
    }

    /// The nine stock panels: three bodies × three windows
    pub fn defaults() -> Vec<PanelSpec> {
        static WINDOWS: [(&str, u32, u32); 3] = [("1min", 300, 5), ("10min", 1440, 10), ("1hour", 2880, 60)];

        Body::all()
            .iter()
            .flat_map(|body| {
                WINDOWS.iter().map(move |(suffix, lookback, interval)| {
                    PanelSpec::new(format!("{}-{}", body, suffix), *body, *lookback, *interval)
                })
            })
            .collect()
    }
}
