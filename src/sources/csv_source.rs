//! CSV Replay
//!
//! Reads `timestamp,magnitude` rows from a file so the pipeline can run
//! offline. Timestamps may be RFC 3339, a common date-time layout, or epoch
//! milliseconds.

use super::*;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::io::Read;
use std::path::{Path, PathBuf};

/// CSV-backed reading source
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    body: Body,
    timestamp_column: usize,
    magnitude_column: usize,
    has_header: bool,
}

/// Outcome of loading a CSV file
#[derive(Debug, Default)]
pub struct CsvLoadReport {
    pub readings: Vec<Reading>,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            body: Body::Earth,
            timestamp_column: 0,
            magnitude_column: 1,
            has_header: true,
        }
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_columns(mut self, timestamp: usize, magnitude: usize) -> Self {
        self.timestamp_column = timestamp;
        self.magnitude_column = magnitude;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every row of the file
    pub fn load(&self) -> Result<CsvLoadReport, SourceError> {
        let file = std::fs::File::open(&self.path)?;
        self.load_from_reader(file)
    }

    /// Load rows from any reader
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<CsvLoadReport, SourceError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut report = CsvLoadReport::default();

        for (row_idx, record) in csv_reader.records().enumerate() {
            report.rows_processed += 1;

            let parsed = record
                .map_err(SourceError::from)
                .and_then(|record| self.parse_row(&record));

            match parsed {
                Ok(reading) => report.readings.push(reading),
                Err(e) => {
                    report.rows_failed += 1;
                    if report.errors.len() < 10 {
                        report.errors.push(format!("Row {}: {}", row_idx + 1, e));
                    }
                }
            }
        }

        Ok(report)
    }

    fn parse_row(&self, record: &csv::StringRecord) -> Result<Reading, SourceError> {
        let ts_str = record
            .get(self.timestamp_column)
            .ok_or_else(|| SourceError::Parse("missing timestamp column".into()))?;
        let mag_str = record
            .get(self.magnitude_column)
            .ok_or_else(|| SourceError::Parse("missing magnitude column".into()))?;

        let timestamp = parse_timestamp(ts_str)?;
        let magnitude: f64 = mag_str
            .parse()
            .map_err(|_| SourceError::Parse(format!("invalid magnitude: {}", mag_str)))?;

        Ok(Reading::new(timestamp, magnitude))
    }
}

/// Parse a timestamp cell
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, SourceError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc());
        }
    }

    if let Ok(millis) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp_millis(millis) {
            return Ok(dt);
        }
    }

    Err(SourceError::Parse(format!("could not parse timestamp: {}", s)))
}

#[async_trait]
impl ReadingSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn body(&self) -> Body {
        self.body
    }

    async fn fetch(&self, window: Window) -> Result<Vec<Reading>, SourceError> {
        let source = self.clone();
        let report = tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| SourceError::Io(std::io::Error::other(e)))??;

        if report.rows_failed > 0 {
            tracing::warn!(
                path = %self.path.display(),
                failed = report.rows_failed,
                "Skipped unparseable CSV rows"
            );
        }

        // A zero lookback means "everything in the file"
        if window.lookback_minutes == 0 {
            return Ok(report.readings);
        }

        let now = Utc::now();
        let start = window.start(now);
        Ok(report
            .readings
            .into_iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= now)
            .collect())
    }
}
