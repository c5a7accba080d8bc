//! Core data types for the QuakeWatch pipeline
//!
//! - `Reading`: a single timestamped magnitude observation
//! - `BucketInterval`: width of an epoch-aligned time slot
//! - `Bucket`: the reduction of every reading that fell into one slot
//! - `Series`: ordered (times, magnitudes) pair handed to the renderer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// A single timestamped magnitude observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Event magnitude (not clamped)
    pub magnitude: f64,
}

impl Reading {
    /// Create a reading at a specific time
    pub fn new(timestamp: DateTime<Utc>, magnitude: f64) -> Self {
        Self {
            timestamp,
            magnitude,
        }
    }

    /// Create a reading from epoch milliseconds
    ///
    /// Returns `None` when the timestamp is outside chrono's range.
    pub fn from_millis(millis: i64, magnitude: f64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|timestamp| Self::new(timestamp, magnitude))
    }
}

/// Width of a bucket, in whole seconds (never zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BucketInterval(NonZeroU32);

impl BucketInterval {
    /// Interval of `secs` seconds, `None` if zero
    pub fn from_secs(secs: u32) -> Option<Self> {
        NonZeroU32::new(secs).map(Self)
    }

    /// Interval of `minutes` minutes, `None` if zero or overflowing
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        minutes.checked_mul(60).and_then(Self::from_secs)
    }

    pub fn as_secs(&self) -> u32 {
        self.0.get()
    }

    pub fn as_millis(&self) -> i64 {
        i64::from(self.0.get()) * 1000
    }

    /// Epoch-aligned bucket key (in seconds) for a timestamp
    ///
    /// Equivalent to `floor(ts_seconds / interval) * interval`, computed on
    /// milliseconds so sub-second timestamps and pre-epoch instants floor
    /// the same way.
    pub fn key_for(&self, timestamp: &DateTime<Utc>) -> i64 {
        let slot = timestamp.timestamp_millis().div_euclid(self.as_millis());
        slot * i64::from(self.as_secs())
    }
}

impl TryFrom<u32> for BucketInterval {
    type Error = String;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        Self::from_secs(secs).ok_or_else(|| "bucket interval must be greater than zero".to_string())
    }
}

impl From<BucketInterval> for u32 {
    fn from(interval: BucketInterval) -> Self {
        interval.as_secs()
    }
}

impl std::fmt::Display for BucketInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Aggregation of all readings sharing one bucket key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Timestamp of the first reading seen for this key
    pub representative_time: DateTime<Utc>,
    /// Running maximum over every reading mapped to this key
    pub max_magnitude: f64,
}

/// Ordered (times, magnitudes) pair, one entry per bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub times: Vec<DateTime<Utc>>,
    pub magnitudes: Vec<f64>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Append one bucket at the end
    pub fn push(&mut self, bucket: Bucket) {
        self.times.push(bucket.representative_time);
        self.magnitudes.push(bucket.max_magnitude);
    }

    /// Largest magnitude in the series
    pub fn max_magnitude(&self) -> Option<f64> {
        self.magnitudes.iter().copied().reduce(f64::max)
    }

    /// Iterate (time, magnitude) pairs in series order
    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.times.iter().copied().zip(self.magnitudes.iter().copied())
    }

    /// Copy of this series ordered chronologically
    pub fn sorted_by_time(&self) -> Series {
        let mut points: Vec<_> = self.points().collect();
        points.sort_by_key(|(time, _)| *time);

        let (times, magnitudes) = points.into_iter().unzip();
        Series { times, magnitudes }
    }

    /// Reorder according to a [`SeriesOrder`]
    pub fn ordered(self, order: SeriesOrder) -> Series {
        match order {
            SeriesOrder::FirstSeen => self,
            SeriesOrder::Chronological => self.sorted_by_time(),
        }
    }
}

/// Order in which buckets are handed to the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesOrder {
    /// Order in which bucket keys were first seen in the input
    FirstSeen,
    /// Sorted by representative time
    #[default]
    Chronological,
}
