//! Download orchestrator: fetches series one by one into the Parquet cache
//! with progress reporting.

use super::cache::{Coverage, ParquetCache};
use super::provider::{DataError, DownloadProgress, SeriesSource};
use tracing::info;

/// Fetch `series` from `source` and cache each one.
///
/// Series already cached are skipped unless `force` is set. Once the source
/// reports itself unavailable (circuit breaker tripped), the remaining series
/// are failed without being requested.
pub fn download_series(
    source: &dyn SeriesSource,
    cache: &ParquetCache,
    series: &[&str],
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = series.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, id) in series.iter().enumerate() {
        progress.on_start(id, i, total);

        if !force {
            if let Some(meta) = cache.get_meta(id) {
                progress.on_complete(id, i, total, &Ok(meta.observation_count));
                succeeded += 1;
                continue;
            }
        }

        let result = download_single(source, cache, id);
        progress.on_complete(id, i, total, &result);

        match result {
            Ok(_) => succeeded += 1,
            Err(e) => {
                errors.push((id.to_string(), e));
                failed += 1;
            }
        }

        if !source.is_available() {
            for rest in &series[(i + 1)..total] {
                errors.push((rest.to_string(), DataError::CircuitBreakerTripped));
                failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(succeeded, failed, total);
    info!(source = source.name(), succeeded, failed, total, "download finished");

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

fn download_single(
    source: &dyn SeriesSource,
    cache: &ParquetCache,
    id: &str,
) -> Result<usize, DataError> {
    let raw = source.load(id)?;
    let coverage = Coverage::requested(source.history_start());
    let meta = cache.write_with_coverage(&raw, source.kind(), coverage)?;
    Ok(meta.observation_count)
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataSource, MemorySource};
    use crate::domain::{RawObservation, RawSeries};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Silent;

    impl DownloadProgress for Silent {
        fn on_start(&self, _: &str, _: usize, _: usize) {}
        fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<usize, DataError>) {}
        fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
    }

    /// Fails every request and reports itself unavailable after the first.
    struct Blocked {
        calls: AtomicUsize,
    }

    impl SeriesSource for Blocked {
        fn name(&self) -> &str {
            "blocked"
        }
        fn kind(&self) -> DataSource {
            DataSource::Fred
        }
        fn load(&self, _: &str) -> Result<RawSeries, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DataError::CircuitBreakerTripped)
        }
        fn is_available(&self) -> bool {
            self.calls.load(Ordering::SeqCst) == 0
        }
    }

    fn gdp() -> RawSeries {
        RawSeries::new(
            "GDP",
            vec![RawObservation::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 28_000.0)],
        )
    }

    #[test]
    fn caches_found_series_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let source = MemorySource::new().with(gdp());

        let summary = download_series(&source, &cache, &["GDP", "NOPE"], false, &Silent);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
        assert_eq!(summary.errors[0].0, "NOPE");
        let meta = cache.get_meta("GDP").unwrap();
        assert_eq!(meta.source, DataSource::CsvImport);
        assert_eq!(meta.coverage, Coverage::FullHistory);
    }

    #[test]
    fn cached_series_are_skipped_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write(&gdp(), DataSource::Fred).unwrap();

        let blocked = Blocked {
            calls: AtomicUsize::new(0),
        };
        let summary = download_series(&blocked, &cache, &["GDP"], false, &Silent);
        assert!(summary.all_succeeded());
        assert_eq!(blocked.calls.load(Ordering::SeqCst), 0);

        let summary = download_series(&blocked, &cache, &["GDP"], true, &Silent);
        assert_eq!(summary.failed, 1);
        assert_eq!(blocked.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stops_requesting_once_source_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let blocked = Blocked {
            calls: AtomicUsize::new(0),
        };

        let summary = download_series(&blocked, &cache, &["A", "B", "C"], false, &Silent);
        assert_eq!(blocked.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.failed, 3);
        assert!(summary
            .errors
            .iter()
            .all(|(_, e)| matches!(e, DataError::CircuitBreakerTripped)));
    }
}
