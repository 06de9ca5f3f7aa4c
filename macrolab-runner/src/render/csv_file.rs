//! Data export: `{name}.csv` with one row per period, plus
//! `{name}_intervals.csv` when the chart is shaded.

use super::{ensure_dir, write_file, ChartRenderer, ChartSpec, RenderError, RenderFormat};
use macrolab_core::domain::{Interval, TimeSeries};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct CsvRenderer {
    output_dir: PathBuf,
}

impl CsvRenderer {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

fn series_csv(series: &TimeSeries) -> Result<Vec<u8>, RenderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["period", "date", "value"])?;
    for (key, value) in series.points() {
        wtr.write_record([
            &key.to_string(),
            &key.end_date().to_string(),
            &value.to_string(),
        ])?;
    }
    wtr.into_inner().map_err(|e| RenderError::Csv(e.into_error().into()))
}

fn intervals_csv(intervals: &[Interval]) -> Result<Vec<u8>, RenderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["start", "end", "open"])?;
    for iv in intervals {
        wtr.write_record([
            &iv.start.end_date().to_string(),
            &iv.effective_end().end_date().to_string(),
            &iv.is_open().to_string(),
        ])?;
    }
    wtr.into_inner().map_err(|e| RenderError::Csv(e.into_error().into()))
}

impl ChartRenderer for CsvRenderer {
    fn format(&self) -> RenderFormat {
        RenderFormat::Csv
    }

    fn render(&self, chart: &ChartSpec<'_>) -> Result<PathBuf, RenderError> {
        if chart.series.is_empty() {
            return Err(RenderError::EmptySeries {
                chart: chart.output_name.to_string(),
            });
        }
        ensure_dir(&self.output_dir)?;

        let path = self.output_dir.join(format!("{}.csv", chart.output_name));
        write_file(&path, &series_csv(chart.series)?)?;

        if let Some(intervals) = chart.intervals.filter(|iv| !iv.is_empty()) {
            let iv_path = self
                .output_dir
                .join(format!("{}_intervals.csv", chart.output_name));
            write_file(&iv_path, &intervals_csv(intervals)?)?;
        }

        info!(chart = chart.output_name, path = %path.display(), "exported chart data");
        Ok(path)
    }
}
