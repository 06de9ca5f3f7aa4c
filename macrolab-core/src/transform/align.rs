//! Period alignment: resample raw observations onto a month/quarter grid.
//!
//! Policy: last observation wins. Observations are ordered by timestamp
//! (stable, so equal timestamps keep source order) and each period keeps the
//! final one. Periods without observations are absent from the output; there
//! is no interpolation and no carry-forward.

use crate::domain::{Frequency, PeriodKey, RawSeries, TimeSeries};
use tracing::debug;

/// Align raw observations to `frequency`, one value per period.
///
/// Non-finite values count as missing and are skipped before selection, so a
/// trailing NaN never masks an earlier valid observation in the same period.
pub fn align(raw: &RawSeries, frequency: Frequency) -> TimeSeries {
    let mut observations: Vec<_> = raw
        .observations
        .iter()
        .filter(|o| o.value.is_finite())
        .collect();
    observations.sort_by_key(|o| o.date);

    let mut points: Vec<(PeriodKey, f64)> = Vec::new();
    for obs in observations {
        let key = PeriodKey::containing(frequency, obs.date);
        match points.last_mut() {
            Some((last_key, last_value)) if *last_key == key => *last_value = obs.value,
            _ => points.push((key, obs.value)),
        }
    }

    debug!(
        series = %raw.id,
        %frequency,
        raw = raw.len(),
        periods = points.len(),
        "aligned series"
    );
    TimeSeries::from_sorted(raw.id.clone(), frequency, points)
}

/// Re-align an already aligned series (e.g. monthly → quarterly).
///
/// Idempotent: `realign(s, s.frequency()) == s`.
pub fn realign(series: &TimeSeries, frequency: Frequency) -> TimeSeries {
    align(&series.to_raw(), frequency)
}
