//! Static SVG line charts.
//!
//! Each chart is one line over calendar time with a title, axis labels, year
//! ticks on the x axis and translucent bands for the shading intervals. The
//! line breaks where consecutive keys are not adjacent periods, so holes in
//! the data stay visible; a period isolated between two holes is drawn as a
//! dot.

use super::{ensure_dir, write_file, ChartRenderer, ChartSpec, RenderError, RenderFormat};
use chrono::{Datelike, NaiveDate};
use macrolab_core::domain::PeriodKey;
use std::path::{Path, PathBuf};
use tracing::info;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 540.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 6;

pub struct SvgRenderer {
    output_dir: PathBuf,
}

impl SvgRenderer {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

impl ChartRenderer for SvgRenderer {
    fn format(&self) -> RenderFormat {
        RenderFormat::Svg
    }

    fn render(&self, chart: &ChartSpec<'_>) -> Result<PathBuf, RenderError> {
        let svg = render_svg(chart).ok_or_else(|| RenderError::EmptySeries {
            chart: chart.output_name.to_string(),
        })?;
        ensure_dir(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.svg", chart.output_name));
        write_file(&path, svg.as_bytes())?;
        info!(chart = chart.output_name, path = %path.display(), "rendered chart");
        Ok(path)
    }
}

/// Linear map from data space to the plot area.
struct Frame {
    x0: i32,
    x1: i32,
    y0: f64,
    y1: f64,
}

impl Frame {
    fn x(&self, date: NaiveDate) -> f64 {
        let span = (self.x1 - self.x0).max(1) as f64;
        let t = (date.num_days_from_ce() - self.x0) as f64 / span;
        MARGIN_LEFT + t * (WIDTH - MARGIN_LEFT - MARGIN_RIGHT)
    }

    fn y(&self, value: f64) -> f64 {
        let t = (value - self.y0) / (self.y1 - self.y0);
        HEIGHT - MARGIN_BOTTOM - t * (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM)
    }
}

/// SVG document for `chart`, `None` when the series is empty.
pub(crate) fn render_svg(chart: &ChartSpec<'_>) -> Option<String> {
    let series = chart.series;
    let (first, _) = series.first()?;
    let (last, _) = series.last()?;
    let (lo, hi) = series.value_range()?;
    let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };

    // Intervals may start before the first key; widen the x range to include them.
    let mut x0 = first.end_date();
    let mut x1 = last.end_date();
    for iv in chart.intervals.unwrap_or_default() {
        x0 = x0.min(iv.start.end_date());
        x1 = x1.max(iv.effective_end().end_date());
    }
    let frame = Frame {
        x0: x0.num_days_from_ce(),
        x1: x1.num_days_from_ce(),
        y0: lo - pad,
        y1: hi + pad,
    };

    let plot_bottom = HEIGHT - MARGIN_BOTTOM;
    let plot_right = WIDTH - MARGIN_RIGHT;
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\" font-family=\"sans-serif\">\n"
    ));
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");

    // Shading
    for iv in chart.intervals.unwrap_or_default() {
        let left = frame.x(iv.start.end_date());
        let right = frame.x(iv.effective_end().end_date());
        svg.push_str(&format!(
            "<rect class=\"interval\" x=\"{left:.1}\" y=\"{MARGIN_TOP}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"#808080\" fill-opacity=\"0.15\"/>\n",
            (right - left).max(2.0),
            plot_bottom - MARGIN_TOP,
        ));
    }

    // Axes
    svg.push_str(&format!(
        "<line x1=\"{MARGIN_LEFT}\" y1=\"{plot_bottom}\" x2=\"{plot_right}\" y2=\"{plot_bottom}\" stroke=\"black\"/>\n"
    ));
    svg.push_str(&format!(
        "<line x1=\"{MARGIN_LEFT}\" y1=\"{MARGIN_TOP}\" x2=\"{MARGIN_LEFT}\" y2=\"{plot_bottom}\" stroke=\"black\"/>\n"
    ));

    // Y ticks
    let decimals = tick_decimals(frame.y1 - frame.y0);
    for i in 0..Y_TICKS {
        let value = frame.y0 + (frame.y1 - frame.y0) * i as f64 / (Y_TICKS - 1) as f64;
        let y = frame.y(value);
        svg.push_str(&format!(
            "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{MARGIN_LEFT}\" y2=\"{y:.1}\" stroke=\"black\"/>\n",
            MARGIN_LEFT - 5.0
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"end\">{value:.decimals$}</text>\n",
            MARGIN_LEFT - 8.0,
            y + 4.0
        ));
    }

    // X ticks: January 1st of every `step`-th year.
    let step = year_step(x1.year() - x0.year());
    let mut year = x0.year() + (step - x0.year().rem_euclid(step)) % step;
    while year <= x1.year() {
        if let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1).filter(|d| *d >= x0) {
            let x = frame.x(date);
            svg.push_str(&format!(
                "<line x1=\"{x:.1}\" y1=\"{plot_bottom}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"black\"/>\n",
                plot_bottom + 5.0
            ));
            svg.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"middle\">{year}</text>\n",
                plot_bottom + 18.0
            ));
        }
        year += step;
    }

    // Series
    for segment in segments(chart) {
        // A lone period between two holes has no line to draw.
        if let [(date, value)] = segment.as_slice() {
            svg.push_str(&format!(
                "<circle class=\"point\" cx=\"{:.1}\" cy=\"{:.1}\" r=\"2.5\" fill=\"#1f77b4\"/>\n",
                frame.x(*date),
                frame.y(*value)
            ));
            continue;
        }
        let points: Vec<String> = segment
            .iter()
            .map(|(date, value)| format!("{:.1},{:.1}", frame.x(*date), frame.y(*value)))
            .collect();
        svg.push_str(&format!(
            "<polyline fill=\"none\" stroke=\"#1f77b4\" stroke-width=\"1.5\" points=\"{}\"/>\n",
            points.join(" ")
        ));
    }

    // Labels
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"28\" font-size=\"16\" text-anchor=\"middle\">{}</text>\n",
        WIDTH / 2.0,
        escape(chart.title)
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"middle\">{}</text>\n",
        (MARGIN_LEFT + plot_right) / 2.0,
        HEIGHT - 15.0,
        escape(chart.x_label)
    ));
    svg.push_str(&format!(
        "<text transform=\"translate(18,{:.1}) rotate(-90)\" font-size=\"12\" text-anchor=\"middle\">{}</text>\n",
        (MARGIN_TOP + plot_bottom) / 2.0,
        escape(chart.y_label)
    ));

    svg.push_str("</svg>\n");
    Some(svg)
}

/// Runs of adjacent periods, as (period end, value).
fn segments(chart: &ChartSpec<'_>) -> Vec<Vec<(NaiveDate, f64)>> {
    let mut out: Vec<Vec<(NaiveDate, f64)>> = Vec::new();
    let mut prev: Option<PeriodKey> = None;
    for &(key, value) in chart.series.points() {
        let adjacent = prev.is_some_and(|p| key.periods_since(p) == Some(1));
        if !adjacent {
            out.push(Vec::new());
        }
        if let Some(run) = out.last_mut() {
            run.push((key.end_date(), value));
        }
        prev = Some(key);
    }
    out
}

fn year_step(span_years: i32) -> i32 {
    [1, 2, 5, 10, 20, 50]
        .into_iter()
        .find(|step| span_years / step <= 12)
        .unwrap_or(100)
}

fn tick_decimals(span: f64) -> usize {
    if span >= 50.0 {
        0
    } else if span >= 5.0 {
        1
    } else if span >= 0.5 {
        2
    } else {
        3
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
