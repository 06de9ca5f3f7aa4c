//! Domain types: frequencies, period keys, series, intervals.

pub mod interval;
pub mod period;
pub mod series;

pub use interval::{Interval, IntervalEnd};
pub use period::{Frequency, PeriodKey};
pub use series::{RawObservation, RawSeries, SeriesError, TimeSeries};
