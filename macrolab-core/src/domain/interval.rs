//! Active intervals of a binary indicator (e.g. recessions).

use super::period::PeriodKey;
use serde::Serialize;
use std::fmt;

/// How an interval ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalEnd {
    /// First key at which the indicator reads 0 again; the interval is `[start, end)`.
    Closed { end: PeriodKey },
    /// The indicator was still active at the last key of the series.
    Open { last: PeriodKey },
}

/// A maximal run of keys where an indicator equals 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start: PeriodKey,
    pub end: IntervalEnd,
}

impl Interval {
    pub fn closed(start: PeriodKey, end: PeriodKey) -> Self {
        Self {
            start,
            end: IntervalEnd::Closed { end },
        }
    }

    pub fn open(start: PeriodKey, last: PeriodKey) -> Self {
        Self {
            start,
            end: IntervalEnd::Open { last },
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.end, IntervalEnd::Open { .. })
    }

    /// Right edge to draw: the closing key, or the last key of the series.
    pub fn effective_end(&self) -> PeriodKey {
        match self.end {
            IntervalEnd::Closed { end } => end,
            IntervalEnd::Open { last } => last,
        }
    }

    /// Whether the indicator was active at `key`.
    pub fn contains(&self, key: PeriodKey) -> bool {
        if key < self.start {
            return false;
        }
        match self.end {
            IntervalEnd::Closed { end } => key < end,
            IntervalEnd::Open { last } => key <= last,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            IntervalEnd::Closed { end } => write!(f, "[{}, {})", self.start, end),
            IntervalEnd::Open { last } => write!(f, "[{}, open through {}]", self.start, last),
        }
    }
}
