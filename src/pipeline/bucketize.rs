//! Interval bucketizer
//!
//! Groups readings into epoch-aligned slots and keeps the maximum magnitude
//! of each slot. Output follows the order in which slots were first seen;
//! use [`Series::sorted_by_time`] when chronological order is wanted.

use std::collections::HashMap;

use super::types::{Bucket, BucketInterval, Reading, Series};

/// Bucketize readings into a series of per-slot maxima
pub fn bucketize(readings: &[Reading], interval: BucketInterval) -> Series {
    let buckets = collect_buckets(readings, interval);

    let mut series = Series {
        times: Vec::with_capacity(buckets.len()),
        magnitudes: Vec::with_capacity(buckets.len()),
    };
    for (_, bucket) in buckets {
        series.push(bucket);
    }
    series
}

/// Keyed buckets in first-seen order
pub fn collect_buckets(readings: &[Reading], interval: BucketInterval) -> Vec<(i64, Bucket)> {
    // key -> position in `buckets`
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut buckets: Vec<(i64, Bucket)> = Vec::new();

    for reading in readings {
        let key = interval.key_for(&reading.timestamp);

        match positions.get(&key) {
            Some(&idx) => {
                let bucket = &mut buckets[idx].1;
                bucket.max_magnitude = bucket.max_magnitude.max(reading.magnitude);
            }
            None => {
                positions.insert(key, buckets.len());
                buckets.push((
                    key,
                    Bucket {
                        representative_time: reading.timestamp,
                        max_magnitude: reading.magnitude,
                    },
                ));
            }
        }
    }

    buckets
}
