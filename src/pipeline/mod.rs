//! QuakeWatch Pipeline
//!
//! The data path every panel runs on each tick:
//!
//! ```text
//!   Reading list → bucketize → Series → render → ChartSurface
//! ```
//!
//! - **types**: `Reading`, `BucketInterval`, `Bucket`, `Series`
//! - **bucketize**: per-slot maximum magnitude
//! - **render**: figure construction and the `ChartSurface` seam
//!
//! # Example
//!
//! ```rust
//! use quakewatch::pipeline::{bucketize, BucketInterval, Reading};
//! use chrono::DateTime;
//!
//! let readings = vec![
//!     Reading::new(DateTime::from_timestamp(0, 0).unwrap(), 2.0),
//!     Reading::new(DateTime::from_timestamp(30, 0).unwrap(), 3.5),
//!     Reading::new(DateTime::from_timestamp(65, 0).unwrap(), 1.0),
//! ];
//!
//! let series = bucketize(&readings, BucketInterval::from_secs(60).unwrap());
//! assert_eq!(series.magnitudes, vec![3.5, 1.0]);
//! ```

pub mod bucketize;
pub mod render;
pub mod types;

pub use bucketize::{bucketize, collect_buckets};
pub use render::{render, y_range, Axis, ChartFigure, ChartSurface, Layout, Trace, EMPTY_Y_RANGE};
pub use types::{Bucket, BucketInterval, Reading, Series, SeriesOrder};
