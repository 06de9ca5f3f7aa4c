//! Element-wise arithmetic across aligned series.
//!
//! Results live on the intersection of the input key domains (inner join).
//! A key is dropped when any operand is absent there or the operation is
//! undefined (zero denominator, non-finite result).

use crate::domain::TimeSeries;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Arithmetic combinators over the operands found at one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// `a / b`; exactly two operands, undefined when `b == 0`.
    Ratio,
    /// Sum of all operands.
    Sum,
    /// First operand minus the rest.
    Difference,
}

impl Combinator {
    pub fn evaluate(self, operands: &[f64]) -> Option<f64> {
        match self {
            Self::Ratio => match operands {
                [_, den] if *den == 0.0 => None,
                [num, den] => Some(num / den),
                _ => None,
            },
            Self::Sum => Some(operands.iter().sum()),
            Self::Difference => {
                let (first, rest) = operands.split_first()?;
                Some(rest.iter().fold(*first, |acc, v| acc - v))
            }
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Ratio => "/",
            Self::Sum => "+",
            Self::Difference => "-",
        }
    }

    /// Apply to `inputs`, naming the result after the operand names.
    pub fn apply(self, inputs: &[&TimeSeries]) -> TimeSeries {
        let name = inputs
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(self.symbol());
        combine(name, inputs, |ops| self.evaluate(ops))
    }
}

/// Combine `inputs` key by key with `op`.
///
/// `op` receives the operands in input order. `None` or a non-finite result
/// excludes the key. Inputs of different frequencies share no keys, so the
/// result is empty.
///
/// # Panics
/// If `inputs` is empty.
pub fn combine<F>(name: impl Into<String>, inputs: &[&TimeSeries], op: F) -> TimeSeries
where
    F: Fn(&[f64]) -> Option<f64>,
{
    assert!(!inputs.is_empty(), "combine requires at least one input series");
    let name = name.into();
    let (first, rest) = (inputs[0], &inputs[1..]);
    let frequency = first.frequency();

    if let Some(other) = rest.iter().find(|s| s.frequency() != frequency) {
        warn!(
            result = %name,
            left = first.name(),
            right = other.name(),
            "combining series of different frequencies yields no common periods"
        );
        return TimeSeries::empty(name, frequency);
    }

    let mut operands = Vec::with_capacity(inputs.len());
    let points = first
        .points()
        .iter()
        .filter_map(|&(key, value)| {
            operands.clear();
            operands.push(value);
            for series in rest {
                operands.push(series.get(key)?);
            }
            op(&operands)
                .filter(|v| v.is_finite())
                .map(|v| (key, v))
        })
        .collect();

    TimeSeries::from_sorted(name, frequency, points)
}

/// `numerator / denominator`, dropping keys where the denominator is zero.
pub fn ratio(numerator: &TimeSeries, denominator: &TimeSeries) -> TimeSeries {
    Combinator::Ratio.apply(&[numerator, denominator])
}

/// Key-wise sum of all inputs.
pub fn sum(inputs: &[&TimeSeries]) -> TimeSeries {
    Combinator::Sum.apply(inputs)
}

/// `a - b`.
pub fn difference(a: &TimeSeries, b: &TimeSeries) -> TimeSeries {
    Combinator::Difference.apply(&[a, b])
}

/// `(n1 + n2 + ...) / (d1 + d2 + ...)` over the keys present in every operand.
///
/// Used for aggregate leverage such as `(CMDEBT + BCSNSDODNS) / (DSPI + CP)`.
///
/// # Panics
/// If either side is empty.
pub fn composite_ratio(numerators: &[&TimeSeries], denominators: &[&TimeSeries]) -> TimeSeries {
    assert!(
        !numerators.is_empty() && !denominators.is_empty(),
        "composite ratio needs at least one numerator and one denominator"
    );
    let join = |side: &[&TimeSeries]| {
        side.iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join("+")
    };
    let name = format!("({})/({})", join(numerators), join(denominators));

    let split = numerators.len();
    let inputs: Vec<&TimeSeries> = numerators.iter().chain(denominators).copied().collect();
    combine(name, &inputs, |ops| {
        let (num, den) = ops.split_at(split);
        let den: f64 = den.iter().sum();
        if den == 0.0 {
            return None;
        }
        Some(num.iter().sum::<f64>() / den)
    })
}
