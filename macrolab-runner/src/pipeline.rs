//! Chart pipeline: load inputs once, compute every chart, render it.
//!
//! Charts are independent. A chart whose inputs are missing, whose
//! expression yields no data, or whose renderer fails is skipped with a
//! reason; the rest of the run continues.

use crate::catalog::{ChartDef, DashboardDef, RECESSION_SERIES};
use crate::expr::ExprError;
use crate::loader::{LoadedSeries, SeriesLoader};
use crate::render::{ChartRenderer, ChartSpec, RenderError};
use crate::report::{ChartOutcome, ChartReport, LatestValue, RunReport};
use chrono::NaiveDate;
use macrolab_core::domain::{Interval, RawSeries, TimeSeries};
use macrolab_core::transform::{align, detect_intervals};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("input series '{series}' unavailable: {reason}")]
    MissingInput { series: String, reason: String },

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("no data after combining inputs (no overlapping periods)")]
    Empty,

    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}

/// A computed chart, ready for rendering.
#[derive(Debug, Clone)]
pub struct ComputedChart {
    pub series: TimeSeries,
    /// Recession intervals within the series' key range, when shading applies.
    pub intervals: Option<Vec<Interval>>,
}

/// Evaluate `chart` against `inputs`.
///
/// `failures` supplies the reason when a required series is absent.
pub fn compute_chart(
    chart: &ChartDef,
    inputs: &BTreeMap<String, RawSeries>,
    failures: &BTreeMap<String, String>,
) -> Result<ComputedChart, ChartError> {
    for id in chart.expr.required_series() {
        if !inputs.contains_key(&id) {
            let reason = failures
                .get(&id)
                .cloned()
                .unwrap_or_else(|| "not loaded".to_string());
            return Err(ChartError::MissingInput { series: id, reason });
        }
    }

    let series = chart
        .expr
        .evaluate(inputs, chart.frequency)?
        .renamed(chart.name.clone());
    if series.is_empty() {
        return Err(ChartError::Empty);
    }

    let intervals = if chart.shade_recessions {
        recession_intervals(chart, &series, inputs)
    } else {
        None
    };

    Ok(ComputedChart { series, intervals })
}

/// Shading is best effort: a missing or malformed indicator leaves the chart unshaded.
fn recession_intervals(
    chart: &ChartDef,
    series: &TimeSeries,
    inputs: &BTreeMap<String, RawSeries>,
) -> Option<Vec<Interval>> {
    let Some(raw) = inputs.get(RECESSION_SERIES) else {
        warn!(chart = %chart.name, "{RECESSION_SERIES} unavailable, rendering without shading");
        return None;
    };
    let (first, _) = series.first()?;
    let (last, _) = series.last()?;
    let indicator = align(raw, chart.frequency).between(first, last);
    match detect_intervals(&indicator) {
        Ok(intervals) => {
            debug!(chart = %chart.name, count = intervals.len(), "recession intervals");
            Some(intervals)
        }
        Err(e) => {
            warn!(chart = %chart.name, error = %e, "bad recession indicator, rendering without shading");
            None
        }
    }
}

fn render_chart(
    chart: &ChartDef,
    computed: &ComputedChart,
    renderers: &[Box<dyn ChartRenderer>],
) -> Result<Vec<PathBuf>, ChartError> {
    let spec = ChartSpec {
        output_name: &chart.name,
        title: &chart.title,
        x_label: &chart.x_label,
        y_label: &chart.y_label,
        series: &computed.series,
        intervals: computed.intervals.as_deref(),
    };
    renderers
        .iter()
        .map(|r| r.render(&spec).map_err(ChartError::from))
        .collect()
}

fn run_chart(
    dashboard: &str,
    chart: &ChartDef,
    inputs: &BTreeMap<String, RawSeries>,
    failures: &BTreeMap<String, String>,
    renderers: &[Box<dyn ChartRenderer>],
) -> ChartReport {
    let outcome = compute_chart(chart, inputs, failures).and_then(|computed| {
        let files = render_chart(chart, &computed, renderers)?;
        Ok((computed, files))
    });

    let outcome = match outcome {
        Ok((computed, files)) => ChartOutcome::Rendered {
            files,
            observations: computed.series.len(),
            latest: computed.series.last().map(LatestValue::from),
            shaded_intervals: computed.intervals.as_ref().map(Vec::len),
        },
        Err(e) => {
            warn!(dashboard, chart = %chart.name, reason = %e, "skipping chart");
            ChartOutcome::Skipped {
                reason: e.to_string(),
            }
        }
    };

    ChartReport {
        dashboard: dashboard.to_string(),
        chart: chart.name.clone(),
        title: chart.title.clone(),
        outcome,
    }
}

/// Inputs restricted to observations on or after `start`.
fn inputs_since(loaded: &LoadedSeries, start: Option<NaiveDate>) -> BTreeMap<String, RawSeries> {
    match start {
        Some(start) => loaded
            .series
            .iter()
            .map(|(id, raw)| (id.clone(), raw.since(start)))
            .collect(),
        None => loaded.series.clone(),
    }
}

/// Load every series the dashboards need (each exactly once), then compute
/// and render all charts in parallel.
pub fn run_dashboards(
    dashboards: &[DashboardDef],
    loader: &SeriesLoader<'_>,
    renderers: &[Box<dyn ChartRenderer>],
) -> RunReport {
    let required: BTreeSet<String> = dashboards
        .iter()
        .flat_map(DashboardDef::required_series)
        .collect();
    info!(
        dashboards = dashboards.len(),
        series = required.len(),
        "loading input series"
    );
    let loaded = loader.load_all(&required);
    run_with_loaded(dashboards, &loaded, renderers)
}

/// Like [`run_dashboards`], with inputs already loaded.
pub fn run_with_loaded(
    dashboards: &[DashboardDef],
    loaded: &LoadedSeries,
    renderers: &[Box<dyn ChartRenderer>],
) -> RunReport {
    let failures: BTreeMap<String, String> = loaded
        .failures
        .iter()
        .map(|(id, e)| (id.clone(), e.to_string()))
        .collect();
    let inputs: Vec<BTreeMap<String, RawSeries>> = dashboards
        .iter()
        .map(|d| inputs_since(loaded, d.start))
        .collect();

    let jobs: Vec<(&DashboardDef, &ChartDef, &BTreeMap<String, RawSeries>)> = dashboards
        .iter()
        .zip(&inputs)
        .flat_map(|(d, inp)| d.charts.iter().map(move |c| (d, c, inp)))
        .collect();

    let charts: Vec<ChartReport> = jobs
        .par_iter()
        .map(|(dashboard, chart, inputs)| {
            run_chart(&dashboard.name, chart, inputs, &failures, renderers)
        })
        .collect();

    let report = RunReport::new(loaded, charts);
    info!(
        rendered = report.rendered_count(),
        skipped = report.skipped_count(),
        "run complete"
    );
    report
}
