//! Integration tests for series acquisition using the CSV fixtures.

use std::path::PathBuf;

use macrolab_core::data::{
    download_series, CsvDirSource, DataError, DataSource, DownloadProgress, ParquetCache,
    SeriesSource,
};
use macrolab_core::domain::{Frequency, Interval, PeriodKey};
use macrolab_core::transform::{align, detect_intervals, ratio};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn q(year: i32, quarter: u32) -> PeriodKey {
    PeriodKey::quarter(year, quarter).unwrap()
}

struct Quiet;

impl DownloadProgress for Quiet {
    fn on_start(&self, _: &str, _: usize, _: usize) {}
    fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<usize, DataError>) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
}

#[test]
fn fixtures_load_with_every_header_convention() {
    let source = CsvDirSource::new(fixture_dir());

    let cmdebt = source.load("CMDEBT").unwrap();
    assert_eq!(cmdebt.len(), 10);

    // Trailing "." is dropped by the reader.
    let dspi = source.load("DSPI").unwrap();
    assert_eq!(dspi.len(), 11);
    assert!(dspi.observations.iter().all(|o| o.value.is_finite()));

    let usrec = source.load("USREC").unwrap();
    assert_eq!(usrec.len(), 7);
}

#[test]
fn fixture_household_dti_covers_shared_quarters() {
    let source = CsvDirSource::new(fixture_dir());
    let debt = align(&source.load("CMDEBT").unwrap(), Frequency::Quarterly);
    let income = align(&source.load("DSPI").unwrap(), Frequency::Quarterly);

    assert_eq!(debt.len(), 10);
    assert_eq!(income.len(), 9);

    let dti = ratio(&debt, &income);
    assert_eq!(dti.len(), 9);
    assert_eq!(dti.first().unwrap().0, q(2019, 1));
    assert_eq!(dti.last().unwrap().0, q(2021, 1));
    assert!(!dti.contains_key(q(2021, 2)));

    let expected = 15502.1 / 15155.0;
    assert!((dti.get(q(2019, 1)).unwrap() - expected).abs() < 1e-12);
}

#[test]
fn fixture_recession_interval() {
    let source = CsvDirSource::new(fixture_dir());
    let usrec = source.load("USREC").unwrap();

    let quarterly = detect_intervals(&align(&usrec, Frequency::Quarterly)).unwrap();
    assert_eq!(quarterly, vec![Interval::closed(q(2020, 1), q(2020, 2))]);

    let monthly = detect_intervals(&align(&usrec, Frequency::Monthly)).unwrap();
    assert_eq!(
        monthly,
        vec![Interval::closed(
            PeriodKey::month(2020, 3).unwrap(),
            PeriodKey::month(2020, 5).unwrap()
        )]
    );
}

#[test]
fn csv_import_into_cache_then_load_offline() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path());
    let source = CsvDirSource::new(fixture_dir());

    let summary = download_series(&source, &cache, &["CMDEBT", "DSPI", "GDP"], false, &Quiet);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(matches!(
        &summary.errors[0],
        (id, DataError::SeriesNotFound { .. }) if id == "GDP"
    ));

    let meta = cache.get_meta("DSPI").unwrap();
    assert_eq!(meta.observation_count, 11);
    assert_eq!(meta.source, DataSource::CsvImport);

    // The cache serves the same observations the CSV did.
    let from_cache: &dyn SeriesSource = &cache;
    assert_eq!(from_cache.kind(), DataSource::Cache);
    assert_eq!(from_cache.load("CMDEBT").unwrap(), source.load("CMDEBT").unwrap());

    let statuses = cache.status(&["CMDEBT", "GDP"]);
    assert!(statuses[0].cached);
    assert!(!statuses[1].cached);
    assert_eq!(cache.cached_series(), vec!["CMDEBT".to_string(), "DSPI".to_string()]);
}
