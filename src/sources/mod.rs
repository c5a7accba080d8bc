//! Reading Sources
//!
//! Adapters that produce the uniform reading list consumed by the pipeline:
//! - USGS event catalog (live feed, also refreshes the map layer)
//! - Synthetic Mars and Moon generators (no public feed exists)
//! - CSV replay (offline)

mod csv_source;
mod synthetic;
mod usgs;

pub use csv_source::{CsvLoadReport, CsvSource};
pub use synthetic::SyntheticSource;
pub use usgs::{FeatureCollection, UsgsConfig, UsgsFeed, DEFAULT_USGS_URL};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{BucketInterval, Reading};

/// Common trait for all reading sources
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Unique name for this source
    fn name(&self) -> &str;

    /// Body the readings belong to
    fn body(&self) -> Body;

    /// Produce readings covering `[now - lookback, now]`
    async fn fetch(&self, window: Window) -> Result<Vec<Reading>, SourceError>;
}

/// Planetary body a source reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Earth,
    Mars,
    Moon,
}

impl Body {
    pub fn all() -> &'static [Body] {
        &[Body::Earth, Body::Mars, Body::Moon]
    }

    /// Name of the events this body produces, used in chart titles
    pub fn quake_label(&self) -> &'static str {
        match self {
            Body::Earth => "Earthquakes",
            Body::Mars => "Marsquakes",
            Body::Moon => "Moonquakes",
        }
    }
}

impl std::fmt::Display for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Earth => write!(f, "earth"),
            Body::Mars => write!(f, "mars"),
            Body::Moon => write!(f, "moon"),
        }
    }
}

impl std::str::FromStr for Body {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earth" => Ok(Body::Earth),
            "mars" => Ok(Body::Mars),
            "moon" => Ok(Body::Moon),
            other => Err(format!("unknown body: {}", other)),
        }
    }
}

/// Lookback window and bucketing interval for one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub lookback_minutes: u32,
    pub interval_minutes: u32,
}

impl Window {
    pub fn new(lookback_minutes: u32, interval_minutes: u32) -> Self {
        Self {
            lookback_minutes,
            interval_minutes,
        }
    }

    pub fn lookback(&self) -> Duration {
        Duration::minutes(i64::from(self.lookback_minutes))
    }

    /// Start of the window relative to `now`
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.lookback()
    }

    /// Bucketing interval, `None` if the interval is zero
    pub fn bucket_interval(&self) -> Option<BucketInterval> {
        BucketInterval::from_minutes(self.interval_minutes)
    }

    /// Number of interval steps that fit in the lookback
    pub fn steps(&self) -> u32 {
        if self.interval_minutes == 0 {
            0
        } else {
            self.lookback_minutes / self.interval_minutes
        }
    }
}

/// Errors that can occur while producing readings
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Request rejected or remote unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// Response not in the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
