//! Chart expressions: a serializable tree over named series.
//!
//! Leaves name a raw series; inner nodes are the core transforms. Every leaf
//! is aligned at the chart's frequency before the tree is evaluated, so the
//! combinators always see series on the same period grid.

use macrolab_core::domain::{Frequency, RawSeries, TimeSeries};
use macrolab_core::transform::{
    align, combine, composite_ratio, difference, percentile_rank, ratio, sum, yoy_change,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("input series '{0}' is not available")]
    MissingSeries(String),

    #[error("{op} needs at least one operand")]
    NoOperands { op: &'static str },

    #[error("YoY lag must be at least 1")]
    ZeroLag,

    #[error("series id must not be empty")]
    EmptySeriesId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SeriesExpr {
    /// A raw series, aligned at the chart frequency.
    Series { id: String },
    Ratio {
        numerator: Box<SeriesExpr>,
        denominator: Box<SeriesExpr>,
    },
    Sum { terms: Vec<SeriesExpr> },
    Difference {
        left: Box<SeriesExpr>,
        right: Box<SeriesExpr>,
    },
    CompositeRatio {
        numerators: Vec<SeriesExpr>,
        denominators: Vec<SeriesExpr>,
    },
    /// Percent change over `lag` periods; the frequency's natural lag when omitted.
    Yoy {
        of: Box<SeriesExpr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lag: Option<usize>,
    },
    Percentile { of: Box<SeriesExpr> },
    /// `of`, restricted to the periods every `domain` expression also has.
    Within {
        of: Box<SeriesExpr>,
        domain: Vec<SeriesExpr>,
    },
}

impl SeriesExpr {
    pub fn series(id: impl Into<String>) -> Self {
        Self::Series { id: id.into() }
    }

    pub fn ratio(numerator: SeriesExpr, denominator: SeriesExpr) -> Self {
        Self::Ratio {
            numerator: Box::new(numerator),
            denominator: Box::new(denominator),
        }
    }

    pub fn difference(left: SeriesExpr, right: SeriesExpr) -> Self {
        Self::Difference {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn composite_ratio(numerators: Vec<SeriesExpr>, denominators: Vec<SeriesExpr>) -> Self {
        Self::CompositeRatio {
            numerators,
            denominators,
        }
    }

    pub fn yoy(self, lag: Option<usize>) -> Self {
        Self::Yoy {
            of: Box::new(self),
            lag,
        }
    }

    pub fn percentile(self) -> Self {
        Self::Percentile { of: Box::new(self) }
    }

    pub fn within(self, domain: Vec<SeriesExpr>) -> Self {
        Self::Within {
            of: Box::new(self),
            domain,
        }
    }

    /// Ids of every raw series the expression reads.
    pub fn required_series(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        self.collect_series(&mut ids);
        ids
    }

    fn collect_series(&self, ids: &mut BTreeSet<String>) {
        match self {
            Self::Series { id } => {
                ids.insert(id.clone());
            }
            Self::Ratio {
                numerator: a,
                denominator: b,
            }
            | Self::Difference { left: a, right: b } => {
                a.collect_series(ids);
                b.collect_series(ids);
            }
            Self::Sum { terms } => terms.iter().for_each(|t| t.collect_series(ids)),
            Self::CompositeRatio {
                numerators,
                denominators,
            } => numerators
                .iter()
                .chain(denominators)
                .for_each(|t| t.collect_series(ids)),
            Self::Yoy { of, .. } | Self::Percentile { of } => of.collect_series(ids),
            Self::Within { of, domain } => {
                of.collect_series(ids);
                domain.iter().for_each(|t| t.collect_series(ids));
            }
        }
    }

    /// Structural checks that do not need data.
    pub fn validate(&self) -> Result<(), ExprError> {
        match self {
            Self::Series { id } if id.trim().is_empty() => Err(ExprError::EmptySeriesId),
            Self::Series { .. } => Ok(()),
            Self::Ratio {
                numerator: a,
                denominator: b,
            }
            | Self::Difference { left: a, right: b } => {
                a.validate()?;
                b.validate()
            }
            Self::Sum { terms } if terms.is_empty() => Err(ExprError::NoOperands { op: "sum" }),
            Self::Sum { terms } => terms.iter().try_for_each(SeriesExpr::validate),
            Self::CompositeRatio {
                numerators,
                denominators,
            } => {
                if numerators.is_empty() || denominators.is_empty() {
                    return Err(ExprError::NoOperands {
                        op: "composite_ratio",
                    });
                }
                numerators
                    .iter()
                    .chain(denominators)
                    .try_for_each(SeriesExpr::validate)
            }
            Self::Yoy { lag: Some(0), .. } => Err(ExprError::ZeroLag),
            Self::Yoy { of, .. } | Self::Percentile { of } => of.validate(),
            Self::Within { domain, .. } if domain.is_empty() => {
                Err(ExprError::NoOperands { op: "within" })
            }
            Self::Within { of, domain } => {
                of.validate()?;
                domain.iter().try_for_each(SeriesExpr::validate)
            }
        }
    }

    /// Evaluate against raw inputs, aligning each leaf at `frequency`.
    pub fn evaluate(
        &self,
        inputs: &BTreeMap<String, RawSeries>,
        frequency: Frequency,
    ) -> Result<TimeSeries, ExprError> {
        self.validate()?;
        self.eval(inputs, frequency)
    }

    fn eval(
        &self,
        inputs: &BTreeMap<String, RawSeries>,
        frequency: Frequency,
    ) -> Result<TimeSeries, ExprError> {
        let all = |exprs: &[SeriesExpr]| {
            exprs
                .iter()
                .map(|e| e.eval(inputs, frequency))
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(match self {
            Self::Series { id } => {
                let raw = inputs
                    .get(id)
                    .ok_or_else(|| ExprError::MissingSeries(id.clone()))?;
                align(raw, frequency)
            }
            Self::Ratio {
                numerator,
                denominator,
            } => ratio(
                &numerator.eval(inputs, frequency)?,
                &denominator.eval(inputs, frequency)?,
            ),
            Self::Difference { left, right } => difference(
                &left.eval(inputs, frequency)?,
                &right.eval(inputs, frequency)?,
            ),
            Self::Sum { terms } => {
                let terms = all(terms)?;
                sum(&terms.iter().collect::<Vec<_>>())
            }
            Self::CompositeRatio {
                numerators,
                denominators,
            } => {
                let nums = all(numerators)?;
                let dens = all(denominators)?;
                composite_ratio(
                    &nums.iter().collect::<Vec<_>>(),
                    &dens.iter().collect::<Vec<_>>(),
                )
            }
            Self::Yoy { of, lag } => {
                let inner = of.eval(inputs, frequency)?;
                let lag = lag.unwrap_or_else(|| frequency.yoy_lag());
                yoy_change(&inner, lag)
            }
            Self::Percentile { of } => percentile_rank(&of.eval(inputs, frequency)?),
            Self::Within { of, domain } => {
                let inner = of.eval(inputs, frequency)?;
                let domain = all(domain)?;
                let mut operands = vec![&inner];
                operands.extend(domain.iter());
                combine(inner.name(), &operands, |v| Some(v[0]))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use macrolab_core::domain::{PeriodKey, RawObservation};

    fn raw(id: &str, quarterly: &[f64]) -> RawSeries {
        RawSeries::new(
            id,
            quarterly
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let date = NaiveDate::from_ymd_opt(2020 + i as i32 / 4, (i as u32 % 4) * 3 + 1, 1)
                        .unwrap();
                    RawObservation::new(date, v)
                })
                .collect(),
        )
    }

    fn inputs(series: &[RawSeries]) -> BTreeMap<String, RawSeries> {
        series.iter().map(|s| (s.id.clone(), s.clone())).collect()
    }

    #[test]
    fn required_series_walks_the_tree() {
        let expr = SeriesExpr::composite_ratio(
            vec![SeriesExpr::series("CMDEBT"), SeriesExpr::series("BCSNSDODNS")],
            vec![SeriesExpr::series("DSPI"), SeriesExpr::series("CP")],
        )
        .yoy(None)
        .percentile();
        let ids: Vec<String> = expr.required_series().into_iter().collect();
        assert_eq!(ids, vec!["BCSNSDODNS", "CMDEBT", "CP", "DSPI"]);
    }

    #[test]
    fn evaluates_ratio_then_percentile() {
        let table = inputs(&[raw("CMDEBT", &[100.0, 110.0, 121.0]), raw("DSPI", &[100.0, 100.0, 110.0])]);
        let expr = SeriesExpr::ratio(SeriesExpr::series("CMDEBT"), SeriesExpr::series("DSPI"));

        let dti = expr.evaluate(&table, Frequency::Quarterly).unwrap();
        assert_eq!(dti.len(), 3);

        let pct = expr.percentile().evaluate(&table, Frequency::Quarterly).unwrap();
        let values: Vec<f64> = pct.values().collect();
        assert!((values[0] - 100.0 / 3.0).abs() < 1e-9);
        assert!((values[2] - 250.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn yoy_lag_defaults_to_frequency() {
        let table = inputs(&[raw("GDP", &[100.0, 101.0, 102.0, 103.0, 110.0])]);
        let yoy = SeriesExpr::series("GDP")
            .yoy(None)
            .evaluate(&table, Frequency::Quarterly)
            .unwrap();
        assert_eq!(yoy.len(), 1);
        assert_eq!(yoy.first().unwrap().0, PeriodKey::quarter(2021, 1).unwrap());

        let yoy1 = SeriesExpr::series("GDP")
            .yoy(Some(1))
            .evaluate(&table, Frequency::Quarterly)
            .unwrap();
        assert_eq!(yoy1.len(), 4);
    }

    #[test]
    fn missing_input_is_reported() {
        let table = inputs(&[raw("FEDFUNDS", &[1.0])]);
        let expr = SeriesExpr::difference(
            SeriesExpr::series("FEDFUNDS"),
            SeriesExpr::series("CPIAUCSL").yoy(Some(12)),
        );
        assert_eq!(
            expr.evaluate(&table, Frequency::Monthly),
            Err(ExprError::MissingSeries("CPIAUCSL".into()))
        );
    }

    #[test]
    fn validation_rejects_degenerate_trees() {
        assert_eq!(
            SeriesExpr::Sum { terms: vec![] }.validate(),
            Err(ExprError::NoOperands { op: "sum" })
        );
        assert_eq!(SeriesExpr::series("X").yoy(Some(0)).validate(), Err(ExprError::ZeroLag));
        assert_eq!(SeriesExpr::series(" ").validate(), Err(ExprError::EmptySeriesId));
    }

    #[test]
    fn within_keeps_only_the_shared_periods() {
        // CMDEBT has one more quarter than DSPI.
        let table = inputs(&[
            raw("CMDEBT", &[100.0, 110.0, 121.0, 130.0]),
            raw("DSPI", &[100.0, 100.0, 110.0]),
        ]);
        let shared = vec![SeriesExpr::series("CMDEBT"), SeriesExpr::series("DSPI")];
        let debt = SeriesExpr::series("CMDEBT")
            .within(shared.clone())
            .evaluate(&table, Frequency::Quarterly)
            .unwrap();
        let income = SeriesExpr::series("DSPI")
            .within(shared)
            .evaluate(&table, Frequency::Quarterly)
            .unwrap();

        assert_eq!(debt.name(), "CMDEBT");
        assert_eq!(debt.values().collect::<Vec<_>>(), vec![100.0, 110.0, 121.0]);
        assert_eq!(income.len(), 3);
        assert_eq!(debt.keys().collect::<Vec<_>>(), income.keys().collect::<Vec<_>>());
        assert_eq!(
            SeriesExpr::series("CMDEBT")
                .within(vec![SeriesExpr::series("DSPI")])
                .required_series()
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["CMDEBT", "DSPI"]
        );
        assert_eq!(
            SeriesExpr::series("CMDEBT").within(vec![]).validate(),
            Err(ExprError::NoOperands { op: "within" })
        );
    }

    #[test]
    fn deserializes_from_toml_inline_tables() {
        let text = r#"
            op = "difference"
            left = { op = "series", id = "DGS10" }
            right = { op = "series", id = "DGS2" }
        "#;
        let expr: SeriesExpr = toml::from_str(text).unwrap();
        assert_eq!(
            expr,
            SeriesExpr::difference(SeriesExpr::series("DGS10"), SeriesExpr::series("DGS2"))
        );

        let text = r#"
            op = "yoy"
            of = { op = "series", id = "CPIAUCSL" }
            lag = 12
        "#;
        let expr: SeriesExpr = toml::from_str(text).unwrap();
        assert_eq!(expr, SeriesExpr::series("CPIAUCSL").yoy(Some(12)));

        let text = r#"
            op = "within"
            of = { op = "series", id = "DSPI" }
            domain = [{ op = "series", id = "CMDEBT" }]
        "#;
        let expr: SeriesExpr = toml::from_str(text).unwrap();
        assert_eq!(
            expr,
            SeriesExpr::series("DSPI").within(vec![SeriesExpr::series("CMDEBT")])
        );
    }
}
