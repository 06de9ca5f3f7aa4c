//! Property tests: series expressions agree with the core transforms they
//! compose, and the CSV export has one row per computed period.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeMap;

use macrolab_core::domain::{Frequency, RawObservation, RawSeries};
use macrolab_core::transform::{align, difference, percentile_rank, ratio, yoy_change};
use macrolab_runner::{ChartRenderer, ChartSpec, CsvRenderer, SeriesExpr};

fn arb_raw(id: &'static str) -> impl Strategy<Value = RawSeries> {
    let value = prop_oneof![
        1 => Just(0.0),
        8 => (-1.0e4..1.0e4_f64),
    ];
    prop::collection::vec((0i64..3_000, value), 0..80).prop_map(move |obs| {
        let base = NaiveDate::from_ymd_opt(2005, 1, 1).unwrap();
        RawSeries::new(
            id,
            obs.into_iter()
                .map(|(days, v)| RawObservation::new(base + Duration::days(days), v))
                .collect(),
        )
    })
}

fn arb_frequency() -> impl Strategy<Value = Frequency> {
    prop_oneof![Just(Frequency::Monthly), Just(Frequency::Quarterly)]
}

fn inputs(a: &RawSeries, b: &RawSeries) -> BTreeMap<String, RawSeries> {
    BTreeMap::from([(a.id.clone(), a.clone()), (b.id.clone(), b.clone())])
}

proptest! {
    #[test]
    fn ratio_expr_matches_core_ratio(a in arb_raw("A"), b in arb_raw("B"), freq in arb_frequency()) {
        let expr = SeriesExpr::ratio(SeriesExpr::series("A"), SeriesExpr::series("B"));
        let got = expr.evaluate(&inputs(&a, &b), freq).unwrap();
        let want = ratio(&align(&a, freq), &align(&b, freq));
        prop_assert_eq!(got.points(), want.points());
    }

    #[test]
    fn yoy_of_difference_uses_frequency_lag(a in arb_raw("A"), b in arb_raw("B"), freq in arb_frequency()) {
        let expr = SeriesExpr::difference(SeriesExpr::series("A"), SeriesExpr::series("B")).yoy(None);
        let got = expr.evaluate(&inputs(&a, &b), freq).unwrap();
        let want = yoy_change(&difference(&align(&a, freq), &align(&b, freq)), freq.yoy_lag());
        prop_assert_eq!(got.points(), want.points());
    }

    #[test]
    fn percentile_expr_stays_in_range(a in arb_raw("A"), b in arb_raw("B")) {
        let expr = SeriesExpr::series("A").percentile();
        let got = expr.evaluate(&inputs(&a, &b), Frequency::Quarterly).unwrap();
        let want = percentile_rank(&align(&a, Frequency::Quarterly));
        prop_assert_eq!(got.points(), want.points());
        prop_assert!(got.values().all(|v| v > 0.0 && v <= 100.0));
    }

    #[test]
    fn csv_export_has_one_row_per_period(a in arb_raw("A"), freq in arb_frequency()) {
        let series = align(&a, freq);
        prop_assume!(!series.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = CsvRenderer::new(dir.path())
            .render(&ChartSpec {
                output_name: "a",
                title: "A",
                x_label: "Date",
                y_label: "Level",
                series: &series,
                intervals: None,
            })
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        prop_assert_eq!(text.lines().count(), series.len() + 1);
    }
}
