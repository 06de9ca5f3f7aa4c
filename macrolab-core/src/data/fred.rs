//! FRED data provider.
//!
//! Downloads a series through the keyless FRED graph CSV endpoint
//! (`fredgraph.csv?id=SERIES`), which returns `observation_date,SERIES` rows
//! with `.` for missing values. Handles rate limiting, retries with
//! exponential backoff and the circuit breaker. Parsing reuses the CSV import
//! path, so header variants are handled in one place.

use super::circuit_breaker::CircuitBreaker;
use super::csv_import::read_observations;
use super::provider::{DataError, DataSource, SeriesSource};
use crate::domain::RawSeries;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const FRED_GRAPH_URL: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";

pub struct FredProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    start: Option<NaiveDate>,
    max_retries: u32,
    base_delay: Duration,
}

impl FredProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("macrolab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: FRED_GRAPH_URL.to_string(),
            start: None,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Only request observations on or after `start`.
    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    /// Point at a different endpoint (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn series_url(&self, series_id: &str) -> String {
        match self.start {
            Some(start) => format!("{}?id={series_id}&cosd={start}", self.base_url),
            None => format!("{}?id={series_id}", self.base_url),
        }
    }

    fn fetch_with_retry(&self, series_id: &str) -> Result<RawSeries, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.series_url(series_id);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(series = series_id, attempt, ?delay, "retrying FRED request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SeriesNotFound {
                    series: series_id.to_string(),
                });
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {series_id}")));
                continue;
            }

            let body = resp
                .text()
                .map_err(|e| DataError::NetworkUnreachable(format!("reading body: {e}")))?;
            let series = parse_body(series_id, &body, &url)?;
            self.circuit_breaker.record_success();
            return Ok(series);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Parse a fredgraph CSV body. An HTML error page or an empty table means
/// the endpoint did not answer with data for this series.
fn parse_body(series_id: &str, body: &str, url: &str) -> Result<RawSeries, DataError> {
    let series = read_observations(body.as_bytes(), series_id, url).map_err(|e| match e {
        DataError::MissingColumn { .. } => DataError::ResponseFormatChanged(e.to_string()),
        other => other,
    })?;
    if series.is_empty() {
        return Err(DataError::SeriesNotFound {
            series: series_id.to_string(),
        });
    }
    Ok(series)
}

impl SeriesSource for FredProvider {
    fn name(&self) -> &str {
        "fred"
    }

    fn kind(&self) -> DataSource {
        DataSource::Fred
    }

    fn load(&self, series_id: &str) -> Result<RawSeries, DataError> {
        let series = self.fetch_with_retry(series_id)?;
        info!(series = series_id, observations = series.len(), "fetched from FRED");
        Ok(series)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }

    fn history_start(&self) -> Option<NaiveDate> {
        self.start
    }
}
