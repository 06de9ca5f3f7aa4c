//! Raw observations and aligned time series.

use super::period::{Frequency, PeriodKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One observation as delivered by a series source (before alignment).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub value: f64,
}

impl RawObservation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// A named sequence of raw observations in source order.
///
/// May be unsorted and may hold several observations per period; the period
/// aligner resolves both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    pub id: String,
    pub observations: Vec<RawObservation>,
}

impl RawSeries {
    pub fn new(id: impl Into<String>, observations: Vec<RawObservation>) -> Self {
        Self {
            id: id.into(),
            observations,
        }
    }

    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> Self {
        Self {
            id: self.id.clone(),
            observations: self
                .observations
                .iter()
                .filter(|o| o.date >= start)
                .copied()
                .collect(),
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|o| o.date).min()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|o| o.date).max()
    }
}

/// Invalid input to a validating `TimeSeries` constructor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series '{series}': key {key} does not follow {previous} (keys must be strictly increasing)")]
    UnsortedKeys {
        series: String,
        previous: PeriodKey,
        key: PeriodKey,
    },

    #[error("series '{series}': non-finite value {value} at {key}")]
    NonFiniteValue {
        series: String,
        key: PeriodKey,
        value: f64,
    },

    #[error("series '{series}': key {key} is not on the {expected} grid")]
    MixedFrequency {
        series: String,
        key: PeriodKey,
        expected: Frequency,
    },
}

/// A named series with exactly one finite value per period key.
///
/// Keys are strictly increasing and share the series frequency. The type
/// has no mutating methods: every pipeline stage builds a new series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    name: String,
    frequency: Frequency,
    points: Vec<(PeriodKey, f64)>,
}

impl TimeSeries {
    /// Validating constructor.
    pub fn new(
        name: impl Into<String>,
        frequency: Frequency,
        points: Vec<(PeriodKey, f64)>,
    ) -> Result<Self, SeriesError> {
        let name = name.into();
        let mut previous: Option<PeriodKey> = None;
        for &(key, value) in &points {
            if key.frequency() != frequency {
                return Err(SeriesError::MixedFrequency {
                    series: name,
                    key,
                    expected: frequency,
                });
            }
            if !value.is_finite() {
                return Err(SeriesError::NonFiniteValue {
                    series: name,
                    key,
                    value,
                });
            }
            if let Some(prev) = previous {
                if key <= prev {
                    return Err(SeriesError::UnsortedKeys {
                        series: name,
                        previous: prev,
                        key,
                    });
                }
            }
            previous = Some(key);
        }
        Ok(Self {
            name,
            frequency,
            points,
        })
    }

    /// Validating constructor from dates; each date is snapped to its period.
    pub fn from_dates(
        name: impl Into<String>,
        frequency: Frequency,
        points: &[(NaiveDate, f64)],
    ) -> Result<Self, SeriesError> {
        let keyed = points
            .iter()
            .map(|&(date, value)| (PeriodKey::containing(frequency, date), value))
            .collect();
        Self::new(name, frequency, keyed)
    }

    /// Consecutive periods starting at `start`, one per value.
    ///
    /// Panics if a value is non-finite; intended for fixtures and benches.
    pub fn consecutive(name: impl Into<String>, start: PeriodKey, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let key = start
                    .offset(i as i32)
                    .expect("consecutive keys stay within the representable range");
                (key, v)
            })
            .collect();
        Self::new(name, start.frequency(), points).expect("consecutive series must be finite")
    }

    /// Constructor for pipeline stages whose output is sorted and finite by construction.
    pub(crate) fn from_sorted(
        name: impl Into<String>,
        frequency: Frequency,
        points: Vec<(PeriodKey, f64)>,
    ) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
        debug_assert!(points.iter().all(|(k, v)| v.is_finite() && k.frequency() == frequency));
        Self {
            name: name.into(),
            frequency,
            points,
        }
    }

    pub fn empty(name: impl Into<String>, frequency: Frequency) -> Self {
        Self::from_sorted(name, frequency, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Same points under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frequency: self.frequency,
            points: self.points.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(PeriodKey, f64)] {
        &self.points
    }

    pub fn keys(&self) -> impl Iterator<Item = PeriodKey> + '_ {
        self.points.iter().map(|(k, _)| *k)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, v)| *v)
    }

    /// Value at `key`, if present.
    pub fn get(&self, key: PeriodKey) -> Option<f64> {
        self.points
            .binary_search_by(|(k, _)| k.cmp(&key))
            .ok()
            .map(|i| self.points[i].1)
    }

    pub fn contains_key(&self, key: PeriodKey) -> bool {
        self.get(key).is_some()
    }

    pub fn first(&self) -> Option<(PeriodKey, f64)> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<(PeriodKey, f64)> {
        self.points.last().copied()
    }

    /// Points with `first <= key <= last`.
    pub fn between(&self, first: PeriodKey, last: PeriodKey) -> TimeSeries {
        let points = self
            .points
            .iter()
            .copied()
            .filter(|(k, _)| *k >= first && *k <= last)
            .collect();
        Self::from_sorted(self.name.clone(), self.frequency, points)
    }

    /// Min and max of the values, `None` when empty.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Period-end dated observations, for re-alignment or export.
    pub fn to_raw(&self) -> RawSeries {
        RawSeries::new(
            self.name.clone(),
            self.points
                .iter()
                .map(|(k, v)| RawObservation::new(k.end_date(), *v))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(year: i32, quarter: u32) -> PeriodKey {
        PeriodKey::quarter(year, quarter).unwrap()
    }

    #[test]
    fn new_accepts_sorted_finite_points() {
        let s = TimeSeries::new(
            "GDP",
            Frequency::Quarterly,
            vec![(q(2020, 1), 1.0), (q(2020, 2), 2.0)],
        )
        .unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(q(2020, 2)), Some(2.0));
        assert_eq!(s.get(q(2020, 3)), None);
    }

    #[test]
    fn new_rejects_duplicate_keys() {
        let err = TimeSeries::new(
            "GDP",
            Frequency::Quarterly,
            vec![(q(2020, 1), 1.0), (q(2020, 1), 2.0)],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::UnsortedKeys { .. }));
    }

    #[test]
    fn new_rejects_nan() {
        let err = TimeSeries::new("GDP", Frequency::Quarterly, vec![(q(2020, 1), f64::NAN)])
            .unwrap_err();
        assert!(matches!(err, SeriesError::NonFiniteValue { .. }));
    }

    #[test]
    fn new_rejects_keys_of_other_frequency() {
        let m = PeriodKey::month(2020, 1).unwrap();
        let err = TimeSeries::new("GDP", Frequency::Quarterly, vec![(m, 1.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::MixedFrequency { .. }));
    }

    #[test]
    fn from_dates_snaps_to_period_end() {
        let s = TimeSeries::from_dates(
            "CP",
            Frequency::Quarterly,
            &[(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), 5.0)],
        )
        .unwrap();
        assert_eq!(
            s.first().unwrap().0.end_date(),
            NaiveDate::from_ymd_opt(2021, 3, 31).unwrap()
        );
    }

    #[test]
    fn consecutive_builds_contiguous_keys() {
        let s = TimeSeries::consecutive("X", q(2019, 4), &[1.0, 2.0, 3.0]);
        let keys: Vec<String> = s.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["2019Q4", "2020Q1", "2020Q2"]);
    }

    #[test]
    fn value_range_and_to_raw() {
        let s = TimeSeries::consecutive("X", q(2020, 1), &[3.0, -1.0, 7.5]);
        assert_eq!(s.value_range(), Some((-1.0, 7.5)));
        let raw = s.to_raw();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.observations[1].date, NaiveDate::from_ymd_opt(2020, 6, 30).unwrap());
        assert!(TimeSeries::empty("E", Frequency::Monthly).value_range().is_none());
    }

    #[test]
    fn between_is_inclusive() {
        let s = TimeSeries::consecutive("X", q(2020, 1), &[1.0, 2.0, 3.0, 4.0]);
        let clipped = s.between(q(2020, 2), q(2020, 3));
        assert_eq!(clipped.points(), &[(q(2020, 2), 2.0), (q(2020, 3), 3.0)]);
        assert!(s.between(q(2021, 1), q(2021, 4)).is_empty());
    }

    #[test]
    fn raw_series_since_filters_early_dates() {
        let raw = RawSeries::new(
            "DSPI",
            vec![
                RawObservation::new(NaiveDate::from_ymd_opt(1959, 12, 1).unwrap(), 1.0),
                RawObservation::new(NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(), 2.0),
            ],
        );
        let trimmed = raw.since(NaiveDate::from_ymd_opt(1960, 1, 1).unwrap());
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed.observations[0].value, 2.0);
    }
}
