//! Series loading and resolution for a run.
//!
//! Given a set of series ids, resolves each one independently:
//! 1. If cached (and not forced) → use the cache, unless it starts after the
//!    requested start or is older than the maximum age
//! 2. If a source is available and not offline → fetch, then write to the cache
//! 3. Otherwise → a stale cached copy if there is one, else a per-series error
//!
//! One failed series never aborts the others; charts that need it are skipped
//! downstream.

use chrono::{Duration, NaiveDate};
use macrolab_core::data::{CacheMeta, Coverage, DataError, DataSource, ParquetCache, SeriesSource};
use macrolab_core::domain::RawSeries;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for '{series}' and offline mode is on")]
    NoCachedDataOffline { series: String },

    #[error("no cached data for '{series}' and no source configured")]
    NoSource { series: String },

    #[error("could not load '{series}': {source}")]
    Fetch {
        series: String,
        #[source]
        source: DataError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Drop observations before this date.
    pub start: Option<NaiveDate>,
    /// Never call the source; cache only.
    pub offline: bool,
    /// Ignore the cache and fetch again.
    pub force: bool,
    /// Cached copies older than this are fetched again when a source is reachable.
    pub max_age: Option<Duration>,
}

/// Outcome of loading a batch of series.
#[derive(Debug, Default)]
pub struct LoadedSeries {
    pub series: BTreeMap<String, RawSeries>,
    pub failures: BTreeMap<String, LoadError>,
    pub provenance: BTreeMap<String, DataSource>,
}

impl LoadedSeries {
    pub fn get(&self, id: &str) -> Option<&RawSeries> {
        self.series.get(id)
    }

    pub fn failure(&self, id: &str) -> Option<&LoadError> {
        self.failures.get(id)
    }
}

pub struct SeriesLoader<'a> {
    source: Option<&'a dyn SeriesSource>,
    cache: Option<&'a ParquetCache>,
    opts: LoadOptions,
}

impl<'a> SeriesLoader<'a> {
    pub fn new(
        source: Option<&'a dyn SeriesSource>,
        cache: Option<&'a ParquetCache>,
        opts: LoadOptions,
    ) -> Self {
        Self {
            source,
            cache,
            opts,
        }
    }

    /// Load every id in `ids`, each resolved on its own.
    pub fn load_all<I, S>(&self, ids: I) -> LoadedSeries
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = LoadedSeries::default();
        for id in ids {
            let id = id.as_ref();
            match self.load_one(id) {
                Ok((raw, provenance)) => {
                    let raw = match self.opts.start {
                        Some(start) => raw.since(start),
                        None => raw,
                    };
                    loaded.provenance.insert(id.to_string(), provenance);
                    loaded.series.insert(id.to_string(), raw);
                }
                Err(e) => {
                    warn!(series = id, error = %e, "series unavailable");
                    loaded.failures.insert(id.to_string(), e);
                }
            }
        }
        info!(
            loaded = loaded.series.len(),
            failed = loaded.failures.len(),
            "series load complete"
        );
        loaded
    }

    fn load_one(&self, id: &str) -> Result<(RawSeries, DataSource), LoadError> {
        let mut stale = None;
        if !self.opts.force {
            if let Some(cache) = self.cache {
                if let Ok(raw) = cache.load(id) {
                    let meta = cache.get_meta(id);
                    match self.refresh_reason(meta.as_ref()) {
                        None => {
                            info!(
                                series = id,
                                age_days = meta.map(|m| m.age().num_days()),
                                "serving cached copy"
                            );
                            return Ok((raw, DataSource::Cache));
                        }
                        Some(reason) => {
                            info!(series = id, reason, "cached copy needs a refresh");
                            stale = Some((raw, reason));
                        }
                    }
                }
            }
        }

        match self.fetch(id) {
            Ok(fetched) => Ok(fetched),
            Err(e) => match stale {
                Some((raw, reason)) => {
                    warn!(series = id, reason, error = %e, "refresh failed, serving cached copy");
                    Ok((raw, DataSource::Cache))
                }
                None => Err(e),
            },
        }
    }

    /// Why a cached copy should be fetched again, `None` when it can be served.
    fn refresh_reason(&self, meta: Option<&CacheMeta>) -> Option<&'static str> {
        let Some(meta) = meta else {
            return Some("no metadata");
        };
        if self.opts.start.is_some_and(|start| !meta.covers(start)) {
            return Some("starts after the requested start");
        }
        if self.opts.max_age.is_some_and(|max| meta.age() > max) {
            return Some("older than the maximum age");
        }
        None
    }

    fn fetch(&self, id: &str) -> Result<(RawSeries, DataSource), LoadError> {
        if self.opts.offline {
            return Err(LoadError::NoCachedDataOffline {
                series: id.to_string(),
            });
        }

        let Some(source) = self.source else {
            return Err(LoadError::NoSource {
                series: id.to_string(),
            });
        };
        if !source.is_available() {
            return Err(LoadError::Fetch {
                series: id.to_string(),
                source: DataError::CircuitBreakerTripped,
            });
        }

        let raw = source.load(id).map_err(|source| LoadError::Fetch {
            series: id.to_string(),
            source,
        })?;
        if let Some(cache) = self.cache {
            let coverage = Coverage::requested(source.history_start());
            if let Err(e) = cache.write_with_coverage(&raw, source.kind(), coverage) {
                warn!(series = id, error = %e, "failed to cache series");
            }
        }
        Ok((raw, source.kind()))
    }
}
