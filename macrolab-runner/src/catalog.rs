//! Chart and dashboard definitions, and the built-in dashboards.

use crate::expr::SeriesExpr;
use chrono::NaiveDate;
use macrolab_core::domain::Frequency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Binary indicator used for recession shading.
pub const RECESSION_SERIES: &str = "USREC";

fn default_x_label() -> String {
    "Date".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDef {
    /// Output file stem.
    pub name: String,
    pub title: String,
    #[serde(default = "default_x_label")]
    pub x_label: String,
    pub y_label: String,
    pub frequency: Frequency,
    pub expr: SeriesExpr,
    #[serde(default)]
    pub shade_recessions: bool,
}

impl ChartDef {
    pub fn new(
        name: &str,
        title: &str,
        y_label: &str,
        frequency: Frequency,
        expr: SeriesExpr,
    ) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            x_label: default_x_label(),
            y_label: y_label.to_string(),
            frequency,
            expr,
            shade_recessions: false,
        }
    }

    pub fn shaded(mut self) -> Self {
        self.shade_recessions = true;
        self
    }

    /// Raw series this chart reads, including the recession indicator when shaded.
    pub fn required_series(&self) -> BTreeSet<String> {
        let mut ids = self.expr.required_series();
        if self.shade_recessions {
            ids.insert(RECESSION_SERIES.to_string());
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Drop observations before this date (on top of the global start).
    #[serde(default)]
    pub start: Option<NaiveDate>,
    pub charts: Vec<ChartDef>,
}

impl DashboardDef {
    pub fn required_series(&self) -> BTreeSet<String> {
        self.charts
            .iter()
            .flat_map(ChartDef::required_series)
            .collect()
    }
}

fn series(id: &str) -> SeriesExpr {
    SeriesExpr::series(id)
}

fn ratio(numerator: &str, denominator: &str) -> SeriesExpr {
    SeriesExpr::ratio(series(numerator), series(denominator))
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Household, corporate, economy-wide and private-sector leverage ratios.
pub fn aggregate_dti() -> DashboardDef {
    let q = Frequency::Quarterly;
    DashboardDef {
        name: "aggregate_dti".into(),
        description: "Debt-to-income and debt-to-GDP ratios, quarterly end of period".into(),
        start: date(1960, 1, 1),
        charts: vec![
            ChartDef::new(
                "aggregate_household_dti",
                "Household Debt-to-Income (CMDEBT/DSPI)",
                "Ratio",
                q,
                ratio("CMDEBT", "DSPI"),
            ),
            ChartDef::new(
                "aggregate_corporate_dti",
                "Corporate Debt-to-Income (BCSNSDODNS/CP)",
                "Ratio",
                q,
                ratio("BCSNSDODNS", "CP"),
            ),
            ChartDef::new(
                "aggregate_debt_to_gdp",
                "Debt-to-GDP (TCMDO/GDP)",
                "Ratio",
                q,
                ratio("TCMDO", "GDP"),
            ),
            ChartDef::new(
                "aggregate_private_dti",
                "Private-Sector Debt-to-Income ((CMDEBT+BCSNSDODNS)/(DSPI+CP))",
                "Ratio",
                q,
                SeriesExpr::composite_ratio(
                    vec![series("CMDEBT"), series("BCSNSDODNS")],
                    vec![series("DSPI"), series("CP")],
                ),
            ),
        ],
    }
}

/// Household debt-to-income with levels, YoY change and historical percentile.
pub fn household_dti() -> DashboardDef {
    let q = Frequency::Quarterly;
    let dti = ratio("CMDEBT", "DSPI");
    // Levels cover the quarters both inputs report, like the ratio.
    let shared = vec![series("CMDEBT"), series("DSPI")];
    DashboardDef {
        name: "household_dti".into(),
        description: "Household debt-to-income dashboard with recession shading".into(),
        start: date(1960, 1, 1),
        charts: vec![
            ChartDef::new(
                "household_dti",
                "Household Debt-to-Income (CMDEBT / DSPI)",
                "Ratio",
                q,
                dti.clone(),
            )
            .shaded(),
            ChartDef::new(
                "household_debt_level",
                "Household Credit Market Debt (CMDEBT)",
                "Billions USD",
                q,
                series("CMDEBT").within(shared.clone()),
            )
            .shaded(),
            ChartDef::new(
                "household_income_level",
                "Disposable Personal Income (DSPI)",
                "Billions USD",
                q,
                series("DSPI").within(shared),
            )
            .shaded(),
            ChartDef::new(
                "household_dti_yoy",
                "Household DTI: YoY Change",
                "Percent",
                q,
                dti.clone().yoy(None),
            )
            .shaded(),
            ChartDef::new(
                "household_dti_percentile",
                "Household DTI: Historical Percentile",
                "Percentile (0-100)",
                q,
                dti.percentile(),
            )
            .shaded(),
        ],
    }
}

/// Fed funds rate minus CPI inflation.
pub fn real_rates() -> DashboardDef {
    DashboardDef {
        name: "real_rates".into(),
        description: "Real policy rate, monthly".into(),
        start: date(1970, 1, 1),
        charts: vec![ChartDef::new(
            "real_policy_rate",
            "Real Policy Rate = Fed Funds - CPI YoY",
            "Percent",
            Frequency::Monthly,
            SeriesExpr::difference(series("FEDFUNDS"), series("CPIAUCSL").yoy(Some(12))),
        )],
    }
}

/// 10-year minus 2-year Treasury spread with recession shading.
pub fn yield_curve() -> DashboardDef {
    DashboardDef {
        name: "yield_curve".into(),
        description: "10y-2y Treasury spread, monthly end of period".into(),
        start: date(1970, 1, 1),
        charts: vec![ChartDef::new(
            "yield_curve_10y_2y",
            "Yield Curve: 10y-2y with Recessions",
            "Percentage Points",
            Frequency::Monthly,
            SeriesExpr::difference(series("DGS10"), series("DGS2")),
        )
        .shaded()],
    }
}

pub fn builtin_dashboards() -> Vec<DashboardDef> {
    vec![aggregate_dti(), household_dti(), real_rates(), yield_curve()]
}

pub fn builtin(name: &str) -> Option<DashboardDef> {
    builtin_dashboards().into_iter().find(|d| d.name == name)
}
