//! Chart renderers.
//!
//! A renderer turns one computed chart (series, labels, optional shading
//! intervals) into a file under its output directory. The directory is
//! renderer configuration and is created on first write.

mod csv_file;
mod svg;

pub use csv_file::CsvRenderer;
pub use svg::SvgRenderer;

use macrolab_core::domain::{Interval, TimeSeries};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chart '{chart}' has no data to render")]
    EmptySeries { chart: String },

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// Output formats a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Svg,
    Csv,
}

impl std::str::FromStr for RenderFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown render format '{other}' (expected svg or csv)")),
        }
    }
}

/// Everything a renderer needs for one chart.
///
/// The series has a value at every key it contains; intervals are in
/// increasing, non-overlapping order.
#[derive(Debug, Clone, Copy)]
pub struct ChartSpec<'a> {
    pub output_name: &'a str,
    pub title: &'a str,
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub series: &'a TimeSeries,
    pub intervals: Option<&'a [Interval]>,
}

pub trait ChartRenderer: Send + Sync {
    fn format(&self) -> RenderFormat;

    /// Write the chart and return the primary file written.
    fn render(&self, chart: &ChartSpec<'_>) -> Result<PathBuf, RenderError>;
}

/// One renderer per requested format, all writing to `output_dir`.
pub fn renderers_for(formats: &[RenderFormat], output_dir: &Path) -> Vec<Box<dyn ChartRenderer>> {
    let mut seen = Vec::new();
    formats
        .iter()
        .filter(|f| {
            if seen.contains(*f) {
                return false;
            }
            seen.push(**f);
            true
        })
        .map(|f| -> Box<dyn ChartRenderer> {
            match f {
                RenderFormat::Svg => Box::new(SvgRenderer::new(output_dir)),
                RenderFormat::Csv => Box::new(CsvRenderer::new(output_dir)),
            }
        })
        .collect()
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), RenderError> {
    std::fs::create_dir_all(dir).map_err(|source| RenderError::Io {
        path: dir.display().to_string(),
        source,
    })
}

pub(crate) fn write_file(path: &Path, contents: &[u8]) -> Result<(), RenderError> {
    std::fs::write(path, contents).map_err(|source| RenderError::Io {
        path: path.display().to_string(),
        source,
    })
}
