//! Delimited-text series import.
//!
//! One row per observation with a date column and a value column. Two header
//! conventions are accepted: `DATE,VALUE` and `observation_date,value`. The
//! FRED graph download (`observation_date,<SERIES_ID>`) also loads: when no
//! named value column exists, a column titled with the series id, or the only
//! other column of a two-column file, is used.
//!
//! Values that fail numeric parsing (FRED writes `.` for a missing
//! observation) are dropped here, so downstream stages only see numbers.

use super::provider::{DataError, DataSource, SeriesSource};
use crate::domain::{RawObservation, RawSeries};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATE_COLUMNS: [&str; 2] = ["DATE", "observation_date"];
pub const VALUE_COLUMNS: [&str; 2] = ["VALUE", "value"];

/// Parse observations for `series_id` from CSV text.
///
/// `origin` names the input in error messages (a path or URL).
pub fn read_observations<R: Read>(
    reader: R,
    series_id: &str,
    origin: &str,
) -> Result<RawSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |names: &[&str]| headers.iter().position(|h| names.iter().any(|n| *n == h));

    let date_idx = column(&DATE_COLUMNS[..]).ok_or_else(|| DataError::MissingColumn {
        path: origin.to_string(),
        kind: "date",
        expected: DATE_COLUMNS.join(", "),
    })?;
    let value_idx = column(&VALUE_COLUMNS[..])
        .or_else(|| column(&[series_id][..]))
        .or_else(|| (headers.len() == 2).then_some(1 - date_idx))
        .ok_or_else(|| DataError::MissingColumn {
            path: origin.to_string(),
            kind: "value",
            expected: format!("{}, {series_id}", VALUE_COLUMNS.join(", ")),
        })?;

    let mut observations = Vec::new();
    let mut dropped = 0usize;
    for record in rdr.records() {
        let record = record?;
        let parsed = record
            .get(date_idx)
            .and_then(parse_date)
            .zip(record.get(value_idx).and_then(parse_value));
        match parsed {
            Some((date, value)) => observations.push(RawObservation::new(date, value)),
            None => dropped += 1,
        }
    }

    debug!(
        series = series_id,
        origin,
        rows = observations.len(),
        dropped,
        "parsed CSV observations"
    );
    Ok(RawSeries::new(series_id, observations))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

fn parse_value(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Reads `{dir}/{SERIES_ID}.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, series_id: &str) -> PathBuf {
        self.dir.join(format!("{series_id}.csv"))
    }
}

impl SeriesSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv_dir"
    }

    fn kind(&self) -> DataSource {
        DataSource::CsvImport
    }

    fn load(&self, series_id: &str) -> Result<RawSeries, DataError> {
        let path = self.path_for(series_id);
        if !path.exists() {
            return Err(DataError::SeriesNotFound {
                series: series_id.to_string(),
            });
        }
        let file = File::open(&path).map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        read_observations(file, series_id, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, id: &str) -> Result<RawSeries, DataError> {
        read_observations(text.as_bytes(), id, "inline")
    }

    #[test]
    fn upper_case_headers() {
        let s = parse("DATE,VALUE\n2020-01-01,1.5\n2020-04-01,2.5\n", "GDP").unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.observations[1].value, 2.5);
        assert_eq!(s.id, "GDP");
    }

    #[test]
    fn lower_case_headers() {
        let s = parse("observation_date,value\n2020-01-01,3\n", "GDP").unwrap();
        assert_eq!(s.observations[0].date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(s.observations[0].value, 3.0);
    }

    #[test]
    fn fred_graph_format_uses_series_column() {
        let s = parse("observation_date,USREC\n2020-02-01,0\n2020-03-01,1\n", "USREC").unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.observations[1].value, 1.0);
    }

    #[test]
    fn unparseable_values_are_dropped() {
        let s = parse(
            "DATE,VALUE\n2020-01-01,.\n2020-02-01,abc\n2020-03-01,\nnot-a-date,1\n2020-04-01,4\n",
            "DGS10",
        )
        .unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.observations[0].value, 4.0);
    }

    #[test]
    fn missing_date_column_is_an_error() {
        let err = parse("when,VALUE\n2020-01-01,1\n", "X").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { kind: "date", .. }));
    }

    #[test]
    fn ambiguous_value_column_is_an_error() {
        let err = parse("DATE,a,b\n2020-01-01,1,2\n", "X").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { kind: "value", .. }));
    }

    #[test]
    fn dir_source_reads_named_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CP.csv"), "DATE,VALUE\n2020-01-01,10\n").unwrap();

        let source = CsvDirSource::new(dir.path());
        assert_eq!(source.load("CP").unwrap().len(), 1);
        assert!(matches!(
            source.load("GDP"),
            Err(DataError::SeriesNotFound { .. })
        ));
    }
}
