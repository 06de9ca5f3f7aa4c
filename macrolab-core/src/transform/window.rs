//! Trailing-window transforms: year-over-year change and percentile rank.

use crate::domain::TimeSeries;

/// Percent change against the value `lag` periods earlier.
///
/// `yoy[i] = (v[i] / v[i - lag] - 1) * 100`
///
/// The lookback is positional, but only counts when the `lag + 1` keys ending
/// at `i` are consecutive periods. After a hole, the first `lag` positions have
/// no value. Keys whose base value is zero are dropped as well.
///
/// # Panics
/// If `lag` is zero.
pub fn yoy_change(series: &TimeSeries, lag: usize) -> TimeSeries {
    assert!(lag >= 1, "YoY lag must be >= 1");
    let points = series.points();

    let changed = points
        .iter()
        .enumerate()
        .skip(lag)
        .filter_map(|(i, &(key, current))| {
            let (base_key, base) = points[i - lag];
            if key.periods_since(base_key) != Some(lag as i32) || base == 0.0 {
                return None;
            }
            let change = (current / base - 1.0) * 100.0;
            change.is_finite().then_some((key, change))
        })
        .collect();

    TimeSeries::from_sorted(
        format!("{} YoY %", series.name()),
        series.frequency(),
        changed,
    )
}

/// YoY change with the series' natural lag (4 quarterly, 12 monthly).
pub fn yoy_default(series: &TimeSeries) -> TimeSeries {
    yoy_change(series, series.frequency().yoy_lag())
}

/// 1-based ascending ranks with ties sharing the mean of their rank positions.
///
/// `[10, 20, 20, 30]` → `[1.0, 2.5, 2.5, 4.0]`.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Sorted positions start..end hold ranks start+1 ..= end.
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Whole-history percentile: `average_rank / N * 100` for every value.
///
/// The rank is global, so early observations are ranked against later ones.
pub fn percentile_rank(series: &TimeSeries) -> TimeSeries {
    let values: Vec<f64> = series.values().collect();
    let n = values.len() as f64;
    let points = series
        .keys()
        .zip(average_ranks(&values))
        .map(|(key, rank)| (key, rank / n * 100.0))
        .collect();

    TimeSeries::from_sorted(
        format!("{} percentile", series.name()),
        series.frequency(),
        points,
    )
}
