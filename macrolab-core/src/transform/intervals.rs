//! Interval detection over a binary indicator series.

use super::TransformError;
use crate::domain::{Interval, PeriodKey, TimeSeries};

/// Contiguous runs where `indicator` equals 1, in key order.
///
/// A run opens on a 0→1 transition and closes on the following 1→0
/// transition, ending at the first key that reads 0 (`[start, end)`). A run
/// still active at the last key is emitted as open, with that key as its
/// effective end.
///
/// Values must be exactly 0 or 1; missing periods must already have been
/// dropped. Any other value is reported as `NonBinaryIndicator`.
pub fn detect_intervals(indicator: &TimeSeries) -> Result<Vec<Interval>, TransformError> {
    let mut intervals = Vec::new();
    let mut open_since: Option<PeriodKey> = None;

    for &(key, value) in indicator.points() {
        let active = if value == 1.0 {
            true
        } else if value == 0.0 {
            false
        } else {
            return Err(TransformError::NonBinaryIndicator {
                series: indicator.name().to_string(),
                key,
                value,
            });
        };

        match (open_since, active) {
            (None, true) => open_since = Some(key),
            (Some(start), false) => {
                intervals.push(Interval::closed(start, key));
                open_since = None;
            }
            _ => {}
        }
    }

    if let (Some(start), Some((last, _))) = (open_since, indicator.last()) {
        intervals.push(Interval::open(start, last));
    }

    Ok(intervals)
}
