//! Run report: per-series provenance and per-chart outcomes, exported as JSON.

use crate::loader::LoadedSeries;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use macrolab_core::data::DataSource;
use macrolab_core::domain::PeriodKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
    pub period: String,
    pub date: NaiveDate,
    pub value: f64,
}

impl From<(PeriodKey, f64)> for LatestValue {
    fn from((key, value): (PeriodKey, f64)) -> Self {
        Self {
            period: key.to_string(),
            date: key.end_date(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartOutcome {
    Rendered {
        files: Vec<PathBuf>,
        observations: usize,
        latest: Option<LatestValue>,
        /// Number of shading intervals, `None` when the chart is unshaded.
        shaded_intervals: Option<usize>,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartReport {
    pub dashboard: String,
    pub chart: String,
    pub title: String,
    #[serde(flatten)]
    pub outcome: ChartOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    /// Where each loaded series came from.
    pub series: BTreeMap<String, DataSource>,
    /// Series that could not be loaded, with the reason.
    pub failed_series: BTreeMap<String, String>,
    pub charts: Vec<ChartReport>,
}

impl RunReport {
    pub fn new(loaded: &LoadedSeries, charts: Vec<ChartReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            series: loaded.provenance.clone(),
            failed_series: loaded
                .failures
                .iter()
                .map(|(id, e)| (id.clone(), e.to_string()))
                .collect(),
            charts,
        }
    }

    pub fn rendered_count(&self) -> usize {
        self.charts
            .iter()
            .filter(|c| matches!(c.outcome, ChartOutcome::Rendered { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.charts.len() - self.rendered_count()
    }

    /// True when charts were requested and none rendered.
    pub fn all_failed(&self) -> bool {
        !self.charts.is_empty() && self.rendered_count() == 0
    }

    /// Human-readable summary: one line per chart with its latest value.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mut current = "";
        for c in &self.charts {
            if c.dashboard != current {
                current = &c.dashboard;
                let _ = writeln!(out, "{current}");
            }
            match &c.outcome {
                ChartOutcome::Rendered {
                    latest: Some(latest),
                    ..
                } => {
                    let _ = writeln!(
                        out,
                        "  {:<28} {:>12.4}  ({})",
                        c.chart, latest.value, latest.period
                    );
                }
                ChartOutcome::Rendered { latest: None, .. } => {
                    let _ = writeln!(out, "  {:<28} (empty)", c.chart);
                }
                ChartOutcome::Skipped { reason } => {
                    let _ = writeln!(out, "  {:<28} SKIPPED: {reason}", c.chart);
                }
            }
        }
        let _ = write!(
            out,
            "{} rendered, {} skipped",
            self.rendered_count(),
            self.skipped_count()
        );
        out
    }

    /// Write `report.json` into `dir`.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(dashboard: &str, chart: &str, value: f64) -> ChartReport {
        let key = PeriodKey::quarter(2024, 4).unwrap();
        ChartReport {
            dashboard: dashboard.into(),
            chart: chart.into(),
            title: chart.into(),
            outcome: ChartOutcome::Rendered {
                files: vec![PathBuf::from(format!("{chart}.svg"))],
                observations: 10,
                latest: Some((key, value).into()),
                shaded_intervals: None,
            },
        }
    }

    fn skipped(dashboard: &str, chart: &str) -> ChartReport {
        ChartReport {
            dashboard: dashboard.into(),
            chart: chart.into(),
            title: chart.into(),
            outcome: ChartOutcome::Skipped {
                reason: "input series 'GDP' unavailable: not loaded".into(),
            },
        }
    }

    #[test]
    fn counts_and_all_failed() {
        let loaded = LoadedSeries::default();
        let report = RunReport::new(&loaded, vec![rendered("a", "x", 1.0), skipped("a", "y")]);
        assert_eq!(report.rendered_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert!(!report.all_failed());

        let report = RunReport::new(&loaded, vec![skipped("a", "y")]);
        assert!(report.all_failed());

        assert!(!RunReport::new(&loaded, vec![]).all_failed());
    }

    #[test]
    fn summary_lists_latest_values_per_dashboard() {
        let report = RunReport::new(
            &LoadedSeries::default(),
            vec![rendered("household_dti", "household_dti", 1.0512), skipped("real_rates", "real_policy_rate")],
        );
        let text = report.summary();
        assert!(text.contains("household_dti\n"));
        assert!(text.contains("1.0512  (2024Q4)"));
        assert!(text.contains("SKIPPED: input series 'GDP'"));
        assert!(text.ends_with("1 rendered, 1 skipped"));
    }

    #[test]
    fn writes_json_with_status_tags() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::new(&LoadedSeries::default(), vec![rendered("a", "x", 2.0), skipped("a", "y")]);
        let path = report.write_json(&dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap(), REPORT_FILE);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["charts"][0]["status"], "rendered");
        assert_eq!(value["charts"][0]["latest"]["date"], "2024-12-31");
        assert_eq!(value["charts"][1]["status"], "skipped");

        let back: RunReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.charts, report.charts);
    }
}
