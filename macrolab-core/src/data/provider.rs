//! Series source trait and structured error types.
//!
//! The `SeriesSource` trait abstracts over where raw observations come from
//! (FRED, a directory of CSV files, the Parquet cache) so the pipeline can be
//! fed from any of them and mocked in tests.

use crate::domain::RawSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data acquisition.
///
/// Displayable in CLI output and in per-chart skip reasons.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("series not found: {series}")]
    SeriesNotFound { series: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{path}: no {kind} column (expected one of: {expected})")]
    MissingColumn {
        path: String,
        kind: &'static str,
        expected: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for series '{series}'; run `macrolab fetch {series}` first")]
    NoCachedData { series: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Fred,
    CsvImport,
    Cache,
}

/// A source of raw series by identifier.
///
/// Implementations coerce values to numbers and drop unparseable rows before
/// returning; the alignment pipeline does not re-validate.
pub trait SeriesSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Provenance tag recorded in cache metadata and run reports.
    fn kind(&self) -> DataSource;

    /// Load all raw observations for `series_id`.
    fn load(&self, series_id: &str) -> Result<RawSeries, DataError>;

    /// Whether the source can currently serve requests (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }

    /// Earliest date this source asks its upstream for; `None` when it
    /// returns the full history.
    fn history_start(&self) -> Option<NaiveDate> {
        None
    }
}

/// Progress callback for multi-series operations.
pub trait DownloadProgress: Send + Sync {
    fn on_start(&self, series: &str, index: usize, total: usize);

    fn on_complete(&self, series: &str, index: usize, total: usize, result: &Result<usize, DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Console progress reporter.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, series: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {series}...", index + 1, total);
    }

    fn on_complete(
        &self,
        series: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(count) => println!("  OK: {series} ({count} observations)"),
            Err(e) => println!("  FAIL: {series}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nFetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// In-memory source, for tests and offline fixtures.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    series: std::collections::BTreeMap<String, RawSeries>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, series: RawSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn insert(&mut self, series: RawSeries) {
        self.series.insert(series.id.clone(), series);
    }
}

impl SeriesSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn kind(&self) -> DataSource {
        DataSource::CsvImport
    }

    fn load(&self, series_id: &str) -> Result<RawSeries, DataError> {
        self.series
            .get(series_id)
            .cloned()
            .ok_or_else(|| DataError::SeriesNotFound {
                series: series_id.to_string(),
            })
    }
}
