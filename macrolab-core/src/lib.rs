//! MacroLab Core: period-keyed series, transforms and series acquisition.
//!
//! This crate holds everything below the dashboard layer:
//! - Domain types (period keys, raw and aligned series, intervals)
//! - Period alignment of raw observations
//! - Pointwise combinators over inner-joined keys
//! - Trailing windows (year-over-year change, whole-history percentile)
//! - Interval detection on binary indicators
//! - Series sources (FRED, CSV directory, Parquet cache)

pub mod data;
pub mod domain;
pub mod transform;
