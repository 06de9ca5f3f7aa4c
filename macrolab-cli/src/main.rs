//! MacroLab CLI: fetch, chart, list and cache commands.
//!
//! Commands:
//! - `fetch`: download series from FRED into the Parquet cache
//! - `charts`: compute and render dashboards from FRED (cached) or CSV files
//! - `list`: show the available dashboards and their charts
//! - `cache status`: report which series are cached and their date ranges

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use macrolab_core::data::{
    download_series, CircuitBreaker, CsvDirSource, FredProvider, ParquetCache, SeriesSource,
    StdoutProgress,
};
use macrolab_runner::{
    renderers_for, run_dashboards, DashboardDef, LoadOptions, MacroLabConfig, RenderFormat,
    SeriesLoader, SourceKind,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "macrolab",
    about = "MacroLab: macroeconomic leverage dashboards from FRED data"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./macrolab.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download series from FRED and cache them as Parquet.
    Fetch {
        /// Series to download (e.g. CMDEBT DSPI). Defaults to every series the dashboards use.
        series: Vec<String>,

        /// Fetch the series of this dashboard (repeatable).
        #[arg(long)]
        dashboard: Vec<String>,

        /// Re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory (overrides config).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Compute and render dashboards.
    Charts {
        /// Dashboard to render (repeatable). Defaults to all.
        #[arg(long)]
        dashboard: Vec<String>,

        /// Series source: fred or csv (overrides config).
        #[arg(long)]
        source: Option<SourceKind>,

        /// Directory of {SERIES}.csv files for the csv source.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Cache directory for the fred source.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output directory for charts and report.json.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Output format (repeatable): svg, csv.
        #[arg(long)]
        format: Vec<RenderFormat>,

        /// Drop observations before this date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Serve only from the cache; never touch the network.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Refetch cached series older than this many days.
        #[arg(long)]
        max_age_days: Option<u32>,
    },
    /// List the available dashboards and charts.
    List,
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached series and their date ranges.
    Status {
        /// Cache directory (overrides config).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = MacroLabConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            series,
            dashboard,
            force,
            cache_dir,
        } => run_fetch(&config, series, &dashboard, force, cache_dir),
        Commands::Charts {
            dashboard,
            source,
            data_dir,
            cache_dir,
            out_dir,
            format,
            start,
            offline,
            max_age_days,
        } => {
            let mut config = config;
            if let Some(source) = source {
                config.data.source = source;
            }
            if let Some(dir) = data_dir {
                config.data.data_dir = dir;
            }
            if let Some(dir) = cache_dir {
                config.data.cache_dir = dir;
            }
            if let Some(dir) = out_dir {
                config.output.dir = dir;
            }
            if !format.is_empty() {
                config.output.formats = format;
            }
            if let Some(start) = start {
                config.data.start = parse_date(&start)?;
            }
            config.data.offline |= offline;
            if max_age_days.is_some() {
                config.data.max_cache_age_days = max_age_days;
            }
            run_charts(&config, &dashboard)
        }
        Commands::List => {
            print_dashboards(&config.all_dashboards());
            Ok(())
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => {
                let dir = cache_dir.unwrap_or_else(|| config.data.cache_dir.clone());
                run_cache_status(&config, &dir)
            }
        },
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn selected_dashboards(config: &MacroLabConfig, names: &[String]) -> Result<Vec<DashboardDef>> {
    if names.is_empty() {
        return Ok(config.all_dashboards());
    }
    names
        .iter()
        .map(|name| config.dashboard(name).map_err(Into::into))
        .collect()
}

fn run_fetch(
    config: &MacroLabConfig,
    series: Vec<String>,
    dashboards: &[String],
    force: bool,
    cache_dir: Option<PathBuf>,
) -> Result<()> {
    let mut ids: BTreeSet<String> = series.into_iter().map(|s| s.to_uppercase()).collect();
    if ids.is_empty() || !dashboards.is_empty() {
        for dashboard in selected_dashboards(config, dashboards)? {
            ids.extend(dashboard.required_series());
        }
    }

    let cache = ParquetCache::new(cache_dir.unwrap_or_else(|| config.data.cache_dir.clone()));
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = FredProvider::new(circuit_breaker)?.with_start(config.data.start);

    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let summary = download_series(&provider, &cache, &id_refs, force, &StdoutProgress);

    if !summary.all_succeeded() {
        for (id, err) in &summary.errors {
            eprintln!("Error for {id}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_charts(config: &MacroLabConfig, names: &[String]) -> Result<()> {
    let dashboards = selected_dashboards(config, names)?;
    let renderers = renderers_for(&config.output.formats, &config.output.dir);
    let opts = LoadOptions {
        start: Some(config.data.start),
        offline: config.data.offline,
        force: false,
        max_age: config.data.max_cache_age(),
    };

    let report = match config.data.source {
        SourceKind::Csv => {
            let source = CsvDirSource::new(&config.data.data_dir);
            info!(dir = %config.data.data_dir.display(), "reading series from CSV files");
            let loader = SeriesLoader::new(Some(&source), None, opts);
            run_dashboards(&dashboards, &loader, &renderers)
        }
        SourceKind::Fred => {
            let cache = ParquetCache::new(&config.data.cache_dir);
            let provider = if config.data.offline {
                None
            } else {
                let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
                Some(FredProvider::new(circuit_breaker)?.with_start(config.data.start))
            };
            let source = provider.as_ref().map(|p| p as &dyn SeriesSource);
            let loader = SeriesLoader::new(source, Some(&cache), opts);
            run_dashboards(&dashboards, &loader, &renderers)
        }
    };

    println!("{}", report.summary());
    let path = report.write_json(&config.output.dir)?;
    println!("Report saved to: {}", path.display());

    if report.all_failed() {
        bail!("no charts rendered");
    }
    Ok(())
}

fn print_dashboards(dashboards: &[DashboardDef]) {
    for dashboard in dashboards {
        let series: Vec<String> = dashboard.required_series().into_iter().collect();
        println!("{}: {}", dashboard.name, dashboard.description);
        println!("  series: {}", series.join(", "));
        for chart in &dashboard.charts {
            let shading = if chart.shade_recessions { " [shaded]" } else { "" };
            println!(
                "  {:<28} {:<10} {}{shading}",
                chart.name, chart.frequency, chart.title
            );
        }
        println!();
    }
}

fn run_cache_status(config: &MacroLabConfig, cache_dir: &Path) -> Result<()> {
    let cache = ParquetCache::new(cache_dir);
    let mut ids: BTreeSet<String> = cache.cached_series().into_iter().collect();
    for dashboard in config.all_dashboards() {
        ids.extend(dashboard.required_series());
    }
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let rows = cache.status(&id_refs);

    println!("Cache: {}", cache_dir.display());
    println!(
        "Cached: {}/{}",
        rows.iter().filter(|r| r.cached).count(),
        rows.len()
    );
    println!();
    println!(
        "{:<12} {:<25} {:>8}  {:<10}",
        "Series", "Date Range", "Obs", "Source"
    );
    println!("{}", "-".repeat(60));
    for row in &rows {
        let range = match (row.start_date, row.end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "(not cached)".to_string(),
        };
        let count = row
            .observation_count
            .map(|n| n.to_string())
            .unwrap_or_default();
        let source = row
            .source
            .and_then(|s| serde_json::to_value(s).ok())
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("{:<12} {:<25} {:>8}  {:<10}", row.series, range, count, source);
    }
    Ok(())
}
