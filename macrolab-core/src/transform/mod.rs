//! The alignment and transformation pipeline.
//!
//! Every stage is a pure function from input series to a new output series:
//! - `align`: raw observations → one value per month/quarter (last wins)
//! - `combine`: ratio / sum / difference over the intersection of keys
//! - `window`: year-over-year change and whole-history percentile rank
//! - `intervals`: contiguous runs of a binary indicator
//!
//! Missing data and undefined operations (zero denominators, absent lookback)
//! are never errors: the affected key is dropped from the output.

pub mod align;
pub mod combine;
pub mod intervals;
pub mod window;

pub use align::{align, realign};
pub use combine::{combine, composite_ratio, difference, ratio, sum, Combinator};
pub use intervals::detect_intervals;
pub use window::{average_ranks, percentile_rank, yoy_change, yoy_default};

use crate::domain::PeriodKey;
use thiserror::Error;

/// Contract violations in transform inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("indicator '{series}' has non-binary value {value} at {key}")]
    NonBinaryIndicator {
        series: String,
        key: PeriodKey,
        value: f64,
    },
}
