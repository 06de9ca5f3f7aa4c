//! TOML run configuration.
//!
//! Every section is optional; missing values fall back to the defaults below.
//!
//! ```toml
//! [data]
//! source = "fred"        # or "csv"
//! data_dir = "data"
//! cache_dir = "cache"
//! start = "1960-01-01"
//! offline = false
//!
//! [output]
//! dir = "charts"
//! formats = ["svg", "csv"]
//!
//! [[dashboards]]
//! name = "spreads"
//! [[dashboards.charts]]
//! name = "spread_10y_3m"
//! title = "10y - 3m"
//! y_label = "Percentage Points"
//! frequency = "monthly"
//! expr = { op = "difference", left = { op = "series", id = "DGS10" }, right = { op = "series", id = "DGS3MO" } }
//! ```

use crate::catalog::{builtin_dashboards, DashboardDef};
use crate::render::RenderFormat;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "macrolab.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown dashboard '{name}' (available: {available})")]
    UnknownDashboard { name: String, available: String },

    #[error("dashboard '{dashboard}', chart '{chart}': {reason}")]
    InvalidChart {
        dashboard: String,
        chart: String,
        reason: String,
    },
}

/// Where raw series come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// FRED graph CSV endpoint, through the Parquet cache.
    Fred,
    /// `{data_dir}/{SERIES}.csv` files.
    Csv,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fred" => Ok(Self::Fred),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown source '{other}' (expected fred or csv)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: SourceKind,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub start: NaiveDate,
    /// Never touch the network; serve only from the cache.
    pub offline: bool,
    /// Refetch cached series older than this many days. Unset: never expire.
    pub max_cache_age_days: Option<u32>,
}

impl DataConfig {
    pub fn max_cache_age(&self) -> Option<chrono::Duration> {
        self.max_cache_age_days
            .map(|days| chrono::Duration::days(i64::from(days)))
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Fred,
            data_dir: PathBuf::from("data"),
            cache_dir: PathBuf::from("cache"),
            start: NaiveDate::from_ymd_opt(1960, 1, 1).unwrap_or_default(),
            offline: false,
            max_cache_age_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub formats: Vec<RenderFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("charts"),
            formats: vec![RenderFormat::Svg],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroLabConfig {
    pub data: DataConfig,
    pub output: OutputConfig,
    /// Custom dashboards; a custom dashboard replaces a built-in of the same name.
    pub dashboards: Vec<DashboardDef>,
}

impl MacroLabConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` when given; otherwise `macrolab.toml` if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    /// Check custom dashboards: valid expressions, unique chart names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for dashboard in &self.dashboards {
            let mut names = BTreeSet::new();
            for chart in &dashboard.charts {
                let invalid = |reason: String| ConfigError::InvalidChart {
                    dashboard: dashboard.name.clone(),
                    chart: chart.name.clone(),
                    reason,
                };
                if chart.name.trim().is_empty() {
                    return Err(invalid("chart name must not be empty".into()));
                }
                if !names.insert(chart.name.as_str()) {
                    return Err(invalid("duplicate chart name".into()));
                }
                chart.expr.validate().map_err(|e| invalid(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Built-in dashboards followed by custom ones, custom replacing built-ins by name.
    pub fn all_dashboards(&self) -> Vec<DashboardDef> {
        let mut all: Vec<DashboardDef> = builtin_dashboards()
            .into_iter()
            .filter(|b| !self.dashboards.iter().any(|c| c.name == b.name))
            .collect();
        all.extend(self.dashboards.iter().cloned());
        all
    }

    pub fn dashboard(&self, name: &str) -> Result<DashboardDef, ConfigError> {
        let all = self.all_dashboards();
        let available = all
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        all.iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDashboard {
                name: name.to_string(),
                available,
            })
    }
}
