//! Parquet cache for raw series, one partition directory per series.
//!
//! Layout: `{cache_dir}/series={ID}/observations.parquet` plus a
//! `meta.json` sidecar (date range, observation count, content hash, source,
//! and how much of the upstream history the fetch asked for).
//!
//! Writes go to a `.tmp` file and are renamed into place. A file that fails
//! validation on load is renamed to `.quarantined` and reported as missing.

use super::provider::{DataError, DataSource, SeriesSource};
use crate::domain::{RawObservation, RawSeries};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const OBSERVATIONS_FILE: &str = "observations.parquet";

/// How much of the upstream history a cached copy holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Written without a known request window.
    #[default]
    Unknown,
    /// Everything the source had.
    FullHistory,
    /// Everything the source had on or after this date.
    Since(NaiveDate),
}

impl Coverage {
    /// Coverage of a fetch that asked for history from `start` (`None`: all of it).
    pub fn requested(start: Option<NaiveDate>) -> Self {
        start.map_or(Self::FullHistory, Self::Since)
    }
}

/// Metadata sidecar for a cached series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub series: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub observation_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
    #[serde(default)]
    pub coverage: Coverage,
}

impl CacheMeta {
    /// Whether the cached copy holds every observation on or after `start`.
    ///
    /// True when the data reaches back to `start`, or when the fetch asked for
    /// at least that much history and the series simply begins later.
    pub fn covers(&self, start: NaiveDate) -> bool {
        self.start_date <= start
            || match self.coverage {
                Coverage::FullHistory => true,
                Coverage::Since(from) => from <= start,
                Coverage::Unknown => false,
            }
    }

    /// Time since the copy was written, against the local clock.
    pub fn age(&self) -> chrono::Duration {
        chrono::Local::now().naive_local() - self.cached_at
    }
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn series_dir(&self, series: &str) -> PathBuf {
        self.cache_dir.join(format!("series={series}"))
    }

    fn data_path(&self, series: &str) -> PathBuf {
        self.series_dir(series).join(OBSERVATIONS_FILE)
    }

    fn meta_path(&self, series: &str) -> PathBuf {
        self.series_dir(series).join("meta.json")
    }

    /// Replace the cached observations for `raw.id`.
    pub fn write(&self, raw: &RawSeries, source: DataSource) -> Result<CacheMeta, DataError> {
        self.write_with_coverage(raw, source, Coverage::Unknown)
    }

    /// [`write`](Self::write), recording the history window the fetch requested.
    pub fn write_with_coverage(
        &self,
        raw: &RawSeries,
        source: DataSource,
        coverage: Coverage,
    ) -> Result<CacheMeta, DataError> {
        let (Some(start_date), Some(end_date)) = (raw.first_date(), raw.last_date()) else {
            return Err(DataError::CacheError(format!(
                "no observations to cache for {}",
                raw.id
            )));
        };

        let dir = self.series_dir(&raw.id);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut df = observations_to_dataframe(&raw.observations)?;
        let path = self.data_path(&raw.id);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            series: raw.id.clone(),
            start_date,
            end_date,
            observation_count: raw.len(),
            data_hash: content_hash(&raw.observations)?,
            source,
            cached_at: chrono::Local::now().naive_local(),
            coverage,
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(&raw.id), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(series = %raw.id, observations = raw.len(), "cached series");
        Ok(meta)
    }

    /// Load cached observations, sorted by date.
    pub fn load(&self, series: &str) -> Result<RawSeries, DataError> {
        let path = self.data_path(series);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                series: series.to_string(),
            });
        }

        match load_and_validate_parquet(&path) {
            Ok(mut observations) => {
                observations.sort_by_key(|o| o.date);
                Ok(RawSeries::new(series, observations))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                let _ = fs::remove_file(self.meta_path(series));
                Err(DataError::NoCachedData {
                    series: series.to_string(),
                })
            }
        }
    }

    pub fn get_meta(&self, series: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(series)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn contains(&self, series: &str) -> bool {
        self.data_path(series).exists() && self.get_meta(series).is_some()
    }

    /// Cache state of each requested series.
    pub fn status(&self, series: &[&str]) -> Vec<CacheStatus> {
        series
            .iter()
            .map(|id| {
                let meta = self.get_meta(id);
                CacheStatus {
                    series: id.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    observation_count: meta.as_ref().map(|m| m.observation_count),
                    source: meta.as_ref().map(|m| m.source),
                }
            })
            .collect()
    }

    /// Every series with a metadata sidecar, sorted by id.
    pub fn cached_series(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_prefix("series=").map(str::to_string)
            })
            .filter(|id| self.get_meta(id).is_some())
            .collect();
        ids.sort();
        ids
    }
}

impl SeriesSource for ParquetCache {
    fn name(&self) -> &str {
        "parquet-cache"
    }

    fn kind(&self) -> DataSource {
        DataSource::Cache
    }

    fn load(&self, series_id: &str) -> Result<RawSeries, DataError> {
        ParquetCache::load(self, series_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub series: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub observation_count: Option<usize>,
    pub source: Option<DataSource>,
}

fn content_hash(observations: &[RawObservation]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(observations)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// 1970-01-01, the zero of the Parquet date column.
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn observations_to_dataframe(observations: &[RawObservation]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = observations
        .iter()
        .map(|o| (o.date - epoch()).num_days() as i32)
        .collect();
    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("value".into(), values),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<RawObservation>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }

    let map_err = |e: PolarsError| DataError::CacheError(format!("column read: {e}"));
    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let value_ca = df
        .column("value")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("value column type: {e}")))?;

    let epoch = epoch();
    let mut observations = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        // Null values were never written; skip them rather than invent a number.
        if let Some(value) = value_ca.get(i) {
            observations.push(RawObservation::new(
                epoch + chrono::Duration::days(days as i64),
                value,
            ));
        }
    }
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> RawSeries {
        RawSeries::new(
            "CMDEBT",
            vec![
                RawObservation::new(d(2023, 10, 1), 20_000.0),
                RawObservation::new(d(2024, 1, 1), 20_250.5),
            ],
        )
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        cache.write(&sample(), DataSource::Fred).unwrap();
        assert!(dir.path().join("series=CMDEBT").join("observations.parquet").exists());

        let loaded = cache.load("CMDEBT").unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn missing_series_is_no_cached_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(matches!(
            cache.load("DSPI"),
            Err(DataError::NoCachedData { series }) if series == "DSPI"
        ));
    }

    #[test]
    fn empty_series_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(cache.write(&RawSeries::empty("X"), DataSource::Fred).is_err());
        assert!(!cache.contains("X"));
    }

    #[test]
    fn meta_records_range_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let written = cache.write(&sample(), DataSource::CsvImport).unwrap();
        let meta = cache.get_meta("CMDEBT").unwrap();

        assert_eq!(meta, written);
        assert_eq!(meta.observation_count, 2);
        assert_eq!(meta.start_date, d(2023, 10, 1));
        assert_eq!(meta.end_date, d(2024, 1, 1));
        assert_eq!(meta.source, DataSource::CsvImport);
        assert_eq!(meta.data_hash.len(), 64);
    }

    #[test]
    fn coverage_decides_whether_an_earlier_start_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        // Sample data begins 2023-10-01.
        let plain = cache.write(&sample(), DataSource::Fred).unwrap();
        assert_eq!(plain.coverage, Coverage::Unknown);
        assert!(plain.covers(d(2023, 10, 1)));
        assert!(!plain.covers(d(1960, 1, 1)));

        let since = cache
            .write_with_coverage(&sample(), DataSource::Fred, Coverage::requested(Some(d(2000, 1, 1))))
            .unwrap();
        assert_eq!(cache.get_meta("CMDEBT").unwrap().coverage, Coverage::Since(d(2000, 1, 1)));
        assert!(since.covers(d(2000, 1, 1)));
        assert!(!since.covers(d(1999, 12, 31)));

        let full = cache
            .write_with_coverage(&sample(), DataSource::Fred, Coverage::requested(None))
            .unwrap();
        assert!(full.covers(d(1960, 1, 1)));
        assert!(full.age() < chrono::Duration::minutes(1));
    }

    #[test]
    fn sidecar_without_coverage_reads_as_unknown() {
        let json = r#"{
            "series": "CMDEBT",
            "start_date": "2023-10-01",
            "end_date": "2024-01-01",
            "observation_count": 2,
            "data_hash": "00",
            "source": "fred",
            "cached_at": "2024-02-01T09:30:00"
        }"#;
        let meta: CacheMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.coverage, Coverage::Unknown);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write(&sample(), DataSource::Fred).unwrap();

        let path = dir.path().join("series=CMDEBT").join("observations.parquet");
        fs::write(&path, b"not parquet").unwrap();

        assert!(matches!(cache.load("CMDEBT"), Err(DataError::NoCachedData { .. })));
        assert!(!path.exists());
        assert!(path.with_extension("parquet.quarantined").exists());
        assert!(!cache.contains("CMDEBT"));
    }

    #[test]
    fn status_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write(&sample(), DataSource::Fred).unwrap();

        let statuses = cache.status(&["CMDEBT", "DSPI"]);
        assert!(statuses[0].cached);
        assert_eq!(statuses[0].observation_count, Some(2));
        assert!(!statuses[1].cached);
        assert_eq!(cache.cached_series(), vec!["CMDEBT".to_string()]);
    }
}
