//! Frequency and period keys.
//!
//! A `PeriodKey` names one calendar month or one calendar quarter on a
//! frequency grid. Keys carry an ordinal (months or quarters counted from
//! year 0) so "consecutive period" checks are plain integer arithmetic, and
//! the period-end date used for display and export.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling grid a series is aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Quarterly,
}

impl Frequency {
    pub const fn periods_per_year(self) -> i32 {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 4,
        }
    }

    /// Lag (in periods) used for year-over-year change: 12 monthly, 4 quarterly.
    pub const fn yoy_lag(self) -> usize {
        self.periods_per_year() as usize
    }

    /// Ordinal of the period containing `date`.
    pub fn ordinal_of(self, date: NaiveDate) -> i32 {
        let month0 = date.month0() as i32;
        match self {
            Self::Monthly => date.year() * 12 + month0,
            Self::Quarterly => date.year() * 4 + month0 / 3,
        }
    }

    /// Last calendar day of the period with the given ordinal.
    ///
    /// `None` only for ordinals outside chrono's representable range.
    fn end_of_ordinal(self, ordinal: i32) -> Option<NaiveDate> {
        let per_year = self.periods_per_year();
        let year = ordinal.div_euclid(per_year);
        let index = ordinal.rem_euclid(per_year) as u32;
        let last_month = match self {
            Self::Monthly => index + 1,
            Self::Quarterly => index * 3 + 3,
        };
        last_day_of_month(year, last_month)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "m" | "month" | "monthly" => Ok(Self::Monthly),
            "q" | "quarter" | "quarterly" => Ok(Self::Quarterly),
            other => Err(format!("unknown frequency '{other}' (expected monthly or quarterly)")),
        }
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).and_then(|d| d.pred_opt())
    }
}

/// One period (month or quarter) on a frequency grid.
///
/// Ordering is by frequency, then ordinal; keys of one series always share
/// a frequency, so within a series the order is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeriodKey {
    frequency: Frequency,
    ordinal: i32,
    end: NaiveDate,
}

impl PeriodKey {
    /// The period of `frequency` that contains `date`.
    pub fn containing(frequency: Frequency, date: NaiveDate) -> Self {
        let ordinal = frequency.ordinal_of(date);
        // The period end lies in the same calendar year as `date`, which chrono
        // can always represent.
        let end = frequency
            .end_of_ordinal(ordinal)
            .expect("period end of a valid date is representable");
        Self {
            frequency,
            ordinal,
            end,
        }
    }

    /// Build a key from its ordinal. `None` if the period end is not representable.
    pub fn from_ordinal(frequency: Frequency, ordinal: i32) -> Option<Self> {
        frequency.end_of_ordinal(ordinal).map(|end| Self {
            frequency,
            ordinal,
            end,
        })
    }

    /// Quarter key from a calendar year and quarter number (1..=4).
    pub fn quarter(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        Self::from_ordinal(Frequency::Quarterly, year * 4 + quarter as i32 - 1)
    }

    /// Month key from a calendar year and month number (1..=12).
    pub fn month(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        Self::from_ordinal(Frequency::Monthly, year * 12 + month as i32 - 1)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn ordinal(&self) -> i32 {
        self.ordinal
    }

    /// Last calendar day of the period.
    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    pub fn year(&self) -> i32 {
        self.end.year()
    }

    /// Key `n` periods later (earlier for negative `n`).
    pub fn offset(&self, n: i32) -> Option<Self> {
        self.ordinal
            .checked_add(n)
            .and_then(|ordinal| Self::from_ordinal(self.frequency, ordinal))
    }

    pub fn next(&self) -> Option<Self> {
        self.offset(1)
    }

    /// Number of periods from `earlier` to `self`; `None` across frequencies.
    pub fn periods_since(&self, earlier: PeriodKey) -> Option<i32> {
        (self.frequency == earlier.frequency).then(|| self.ordinal - earlier.ordinal)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency {
            Frequency::Quarterly => {
                write!(f, "{}Q{}", self.ordinal.div_euclid(4), self.ordinal.rem_euclid(4) + 1)
            }
            Frequency::Monthly => write!(f, "{}", self.end.format("%Y-%m")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn quarter_end_dates() {
        let q = PeriodKey::containing(Frequency::Quarterly, d(2024, 2, 14));
        assert_eq!(q.end_date(), d(2024, 3, 31));
        assert_eq!(q.to_string(), "2024Q1");

        let q4 = PeriodKey::containing(Frequency::Quarterly, d(2023, 10, 1));
        assert_eq!(q4.end_date(), d(2023, 12, 31));
        assert_eq!(q4.to_string(), "2023Q4");

        let q2 = PeriodKey::containing(Frequency::Quarterly, d(2023, 6, 30));
        assert_eq!(q2.end_date(), d(2023, 6, 30));
    }

    #[test]
    fn month_end_handles_leap_years() {
        let feb = PeriodKey::containing(Frequency::Monthly, d(2024, 2, 1));
        assert_eq!(feb.end_date(), d(2024, 2, 29));
        assert_eq!(feb.to_string(), "2024-02");

        let feb_2023 = PeriodKey::containing(Frequency::Monthly, d(2023, 2, 10));
        assert_eq!(feb_2023.end_date(), d(2023, 2, 28));
    }

    #[test]
    fn dates_in_same_quarter_share_a_key() {
        let a = PeriodKey::containing(Frequency::Quarterly, d(2020, 4, 1));
        let b = PeriodKey::containing(Frequency::Quarterly, d(2020, 6, 30));
        assert_eq!(a, b);
        assert_eq!(a, PeriodKey::quarter(2020, 2).unwrap());
    }

    #[test]
    fn consecutive_quarters_across_year_boundary() {
        let q4 = PeriodKey::quarter(2019, 4).unwrap();
        let q1 = q4.next().unwrap();
        assert_eq!(q1, PeriodKey::quarter(2020, 1).unwrap());
        assert_eq!(q1.periods_since(q4), Some(1));
        assert_eq!(q1.end_date(), d(2020, 3, 31));
    }

    #[test]
    fn periods_since_rejects_mixed_frequency() {
        let m = PeriodKey::month(2020, 3).unwrap();
        let q = PeriodKey::quarter(2020, 1).unwrap();
        assert_eq!(m.periods_since(q), None);
    }

    #[test]
    fn invalid_quarter_and_month_numbers() {
        assert!(PeriodKey::quarter(2020, 0).is_none());
        assert!(PeriodKey::quarter(2020, 5).is_none());
        assert!(PeriodKey::month(2020, 13).is_none());
    }

    #[test]
    fn frequency_parsing() {
        assert_eq!("Q".parse::<Frequency>().unwrap(), Frequency::Quarterly);
        assert_eq!("monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert!("weekly".parse::<Frequency>().is_err());
        assert_eq!(Frequency::Quarterly.yoy_lag(), 4);
        assert_eq!(Frequency::Monthly.yoy_lag(), 12);
    }

    #[test]
    fn keys_order_chronologically() {
        let mut keys = vec![
            PeriodKey::quarter(2021, 1).unwrap(),
            PeriodKey::quarter(2019, 3).unwrap(),
            PeriodKey::quarter(2020, 4).unwrap(),
        ];
        keys.sort();
        assert_eq!(keys[0].to_string(), "2019Q3");
        assert_eq!(keys[2].to_string(), "2021Q1");
    }
}
