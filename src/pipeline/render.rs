//! Series renderer
//!
//! Turns a [`Series`] into a Plotly-compatible figure document and draws it
//! onto a [`ChartSurface`]. Drawing replaces whatever the target held.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::Series;

/// Y-axis range used when the series has no points
pub const EMPTY_Y_RANGE: [f64; 2] = [0.0, 1.0];

/// Headroom added above the largest magnitude
const Y_HEADROOM: f64 = 1.0;

const TIME_TICK_FORMAT: &str = "%H:%M\n%b %d";

/// Somewhere a figure can be drawn, addressed by target id
#[async_trait]
pub trait ChartSurface: Send + Sync {
    /// Replace the figure shown at `target`
    async fn draw(&self, target: &str, figure: ChartFigure);
}

/// Render a series to `target` with the given title
pub async fn render(series: &Series, target: &str, title: &str, surface: &dyn ChartSurface) {
    let figure = ChartFigure::from_series(series, title);
    surface.draw(target, figure).await;
}

/// Y-axis bounds for a series: `[0, max + 1]`, or `[0, 1]` when empty
pub fn y_range(series: &Series) -> [f64; 2] {
    match series.max_magnitude() {
        Some(max) if max.is_finite() => [0.0, max + Y_HEADROOM],
        _ => EMPTY_Y_RANGE,
    }
}

/// A complete chart: traces plus layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartFigure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

/// One line+marker trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub x: Vec<DateTime<Utc>>,
    pub y: Vec<f64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub mode: String,
    pub marker: MarkerStyle,
    pub line: LineStyle,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub size: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub title: String,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub dragmode: String,
    pub autosize: bool,
    pub responsive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub title: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickformat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

impl ChartFigure {
    /// Build the magnitude-over-time figure for a series
    pub fn from_series(series: &Series, title: &str) -> Self {
        let trace = Trace {
            x: series.times.clone(),
            y: series.magnitudes.clone(),
            kind: "scatter".to_string(),
            mode: "lines+markers".to_string(),
            marker: MarkerStyle {
                size: 8,
                color: "blue".to_string(),
            },
            line: LineStyle {
                color: "red".to_string(),
            },
            name: "Magnitude".to_string(),
        };

        let layout = Layout {
            title: title.to_string(),
            xaxis: Axis {
                title: "Time".to_string(),
                kind: Some("date".to_string()),
                tickformat: Some(TIME_TICK_FORMAT.to_string()),
                range: None,
            },
            yaxis: Axis {
                title: "Magnitude".to_string(),
                kind: None,
                tickformat: None,
                range: Some(y_range(series)),
            },
            dragmode: "zoom".to_string(),
            autosize: true,
            responsive: true,
        };

        Self {
            data: vec![trace],
            layout,
        }
    }

    /// Number of plotted points across all traces
    pub fn point_count(&self) -> usize {
        self.data.iter().map(|t| t.y.len()).sum()
    }
}
