//! MacroLab Runner: dashboards, configuration, the chart pipeline and renderers.
//!
//! This crate builds on `macrolab-core` to provide:
//! - Series expressions (ratios, sums, differences, YoY, percentile) over raw inputs
//! - Built-in dashboards and TOML-defined custom ones
//! - Series loading with cache/fetch fallback and per-series failures
//! - Parallel chart computation with recession shading
//! - SVG and CSV renderers, and a JSON run report

pub mod catalog;
pub mod config;
pub mod expr;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod report;

pub use catalog::{builtin, builtin_dashboards, ChartDef, DashboardDef, RECESSION_SERIES};
pub use config::{ConfigError, DataConfig, MacroLabConfig, OutputConfig, SourceKind};
pub use expr::{ExprError, SeriesExpr};
pub use loader::{LoadError, LoadOptions, LoadedSeries, SeriesLoader};
pub use pipeline::{compute_chart, run_dashboards, run_with_loaded, ChartError, ComputedChart};
pub use render::{
    renderers_for, ChartRenderer, ChartSpec, CsvRenderer, RenderError, RenderFormat, SvgRenderer,
};
pub use report::{ChartOutcome, ChartReport, LatestValue, RunReport};
