//! Series acquisition: sources, the FRED provider, CSV import and the Parquet cache.

pub mod cache;
pub mod circuit_breaker;
pub mod csv_import;
pub mod download;
pub mod fred;
pub mod provider;

pub use cache::{CacheMeta, CacheStatus, Coverage, ParquetCache};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_import::{read_observations, CsvDirSource};
pub use download::{download_series, DownloadSummary};
pub use fred::FredProvider;
pub use provider::{DataError, DataSource, DownloadProgress, MemorySource, SeriesSource, StdoutProgress};
