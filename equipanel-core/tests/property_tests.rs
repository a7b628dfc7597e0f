//! Property tests for panel invariants.
//!
//! Uses proptest to verify:
//! 1. Percentage literals parse to exactly one hundredth of their number,
//!    also inside columns that stay text
//! 2. Winsorization keeps every value inside the bounds it reports
//! 3. Forward-filled disclosures are causal: a row only sees the latest
//!    publication dated on or before it
//! 4. Recomputed changes match the close ratio and drop one row per entity
//! 5. Joined panels have unique, sorted (entity, date) keys

use chrono::{Duration, NaiveDate};
use equipanel_core::clean::recompute_pct_change;
use equipanel_core::domain::column::{column_numbers, date_column, number_column};
use equipanel_core::domain::{DisclosureSource, Panel, SourceTable, SourceTables};
use equipanel_core::features::returns::{clip_to, winsor_bounds};
use equipanel_core::join::join_sources;
use equipanel_core::percent::{cast_text_column, parse_percentage, ColumnCast};
use equipanel_core::PipelineConfig;
use polars::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_maybe_missing() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![3 => (-1e6..1e6_f64), 1 => Just(f64::NAN)],
        0..80,
    )
}

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..500.0_f64, 2..40)
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

fn day(offset: i64) -> Option<NaiveDate> {
    Some(base_date() + Duration::days(offset))
}

// ── 1. Percent literals ──────────────────────────────────────────────

proptest! {
    #[test]
    fn percent_literal_is_a_hundredth(hundredths in -100_000i64..100_000) {
        let number = hundredths as f64 / 100.0;
        let literal = format!("{number:.2}%");
        let parsed = parse_percentage(&literal).unwrap();
        prop_assert!((parsed - number / 100.0).abs() < 1e-12, "{literal} -> {parsed}");
    }

    #[test]
    fn text_column_carries_percent_cells_as_fractions(
        hundredths in -100_000i64..100_000,
        word in "x[a-z]{0,7}",
    ) {
        let number = hundredths as f64 / 100.0;
        let cells = vec![Some(format!("{number:.2}%")), Some(word.clone()), None];
        let ColumnCast::Text(out) = cast_text_column(cells) else {
            panic!("a non-numeric word must keep the column as text");
        };
        let fraction: f64 = out[0].as_deref().unwrap().parse().unwrap();
        prop_assert!((fraction - number / 100.0).abs() < 1e-12);
        prop_assert_eq!(out[1].as_deref(), Some(word.as_str()));
        prop_assert_eq!(out[2].as_deref(), None);
    }
}

// ── 2. Winsorization ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn winsorized_values_stay_inside_bounds(
        values in arb_maybe_missing(),
        lower_q in 0.0..0.5_f64,
        upper_q in 0.5..1.0_f64,
    ) {
        let frame = DataFrame::new(vec![number_column("r", &values)]).unwrap();
        let (lower, upper) = winsor_bounds(&frame, "r", lower_q, upper_q).unwrap();
        let clipped = frame
            .lazy()
            .select([clip_to(col("r"), lower, upper).alias("r")])
            .collect()
            .unwrap();
        let clipped = column_numbers(clipped.column("r").unwrap()).unwrap();

        let missing_before = values.iter().filter(|v| v.is_nan()).count();
        prop_assert_eq!(clipped.iter().filter(|v| v.is_nan()).count(), missing_before);
        if missing_before < values.len() {
            prop_assert!(lower <= upper);
            for v in clipped.iter().filter(|v| !v.is_nan()) {
                prop_assert!(*v >= lower && *v <= upper);
            }
        }
    }
}

// ── 3. Forward-fill causality ────────────────────────────────────────

proptest! {
    #[test]
    fn disclosure_rows_see_only_past_publications(
        published in prop::collection::btree_set(0i64..60, 1..12),
    ) {
        let days: Vec<Option<NaiveDate>> = (0..60).map(day).collect();
        let prices = DataFrame::new(vec![
            Column::new("isin".into(), vec!["PL0"; 60]),
            date_column("date", &days).unwrap(),
            Column::new("close".into(), vec![10.0; 60]),
        ])
        .unwrap();
        let metadata = df!("isin" => &["PL0"], "ticker" => &["AAA"]).unwrap();

        let offsets: Vec<i64> = published.iter().copied().collect();
        let disclosure = DataFrame::new(vec![
            Column::new("ticker".into(), vec!["AAA"; offsets.len()]),
            date_column("published", &offsets.iter().map(|o| day(*o)).collect::<Vec<_>>()).unwrap(),
            Column::new("value".into(), offsets.iter().map(|o| *o as f64).collect::<Vec<_>>()),
        ])
        .unwrap();
        let sources = SourceTables {
            prices: SourceTable::new("prices", prices),
            metadata: SourceTable::new("metadata", metadata),
            disclosures: vec![DisclosureSource::new(SourceTable::new("snapshots", disclosure), "published")],
        };

        let (panel, _) = join_sources(&sources, &PipelineConfig::default()).unwrap();
        prop_assert_eq!(panel.height(), 60);
        let values = panel.numbers("value").unwrap();
        for (row, value) in values.iter().enumerate() {
            let latest = offsets.iter().rev().find(|o| **o <= row as i64);
            match latest {
                Some(o) => prop_assert_eq!(*value, *o as f64),
                None => prop_assert!(value.is_nan(), "row {} filled before any publication", row),
            }
        }
    }
}

// ── 4. Percentage-change repair ──────────────────────────────────────

proptest! {
    #[test]
    fn recomputed_change_matches_close_ratio(a in arb_closes(), b in arb_closes()) {
        let mut entities = Vec::new();
        let mut dates = Vec::new();
        let mut close = Vec::new();
        for (entity, closes) in [("AAA", &a), ("BBB", &b)] {
            for (i, c) in closes.iter().enumerate() {
                entities.push(entity);
                dates.push(day(i as i64));
                close.push(*c);
            }
        }
        let n = close.len();
        let frame = DataFrame::new(vec![
            Column::new("ticker".into(), entities),
            date_column("date", &dates).unwrap(),
            Column::new("close".into(), close),
            Column::new("pct_change".into(), vec![0.0; n]),
        ])
        .unwrap();
        let panel = Panel::new(frame, "ticker", "date").unwrap();

        let (cleaned, gaps) = recompute_pct_change(panel, &PipelineConfig::default()).unwrap();
        prop_assert!(gaps.is_empty());
        prop_assert_eq!(cleaned.height(), n - 2);

        let change = cleaned.numbers("pct_change").unwrap();
        let expected: Vec<f64> = [&a, &b]
            .iter()
            .flat_map(|closes| closes.windows(2).map(|w| (w[1] / w[0] - 1.0) * 100.0))
            .collect();
        for (got, want) in change.iter().zip(&expected) {
            prop_assert!((got - want).abs() < 1e-9);
        }
    }
}

// ── 5. Unique join keys ──────────────────────────────────────────────

proptest! {
    #[test]
    fn joined_keys_are_unique_and_sorted(
        rows in prop::collection::btree_set((0usize..4, 0i64..30), 1..60),
    ) {
        let rows: Vec<(usize, i64)> = rows.into_iter().collect();
        let prices = DataFrame::new(vec![
            Column::new("isin".into(), rows.iter().map(|(e, _)| format!("PL{e}")).collect::<Vec<_>>()),
            date_column("date", &rows.iter().map(|(_, d)| day(*d)).collect::<Vec<_>>()).unwrap(),
            Column::new(
                "close".into(),
                rows.iter().map(|(e, d)| 10.0 + (*e as f64) + (*d as f64)).collect::<Vec<_>>(),
            ),
        ])
        .unwrap();
        let metadata = df!(
            "isin" => &["PL0", "PL1", "PL2", "PL3"],
            "ticker" => &["DDD", "CCC", "BBB", "AAA"],
        )
        .unwrap();
        let sources = SourceTables {
            prices: SourceTable::new("prices", prices),
            metadata: SourceTable::new("metadata", metadata),
            disclosures: vec![],
        };

        let (panel, report) = join_sources(&sources, &PipelineConfig::default()).unwrap();
        prop_assert_eq!(panel.height(), rows.len());
        prop_assert!(panel.first_duplicate_key().unwrap().is_none());

        let entities = panel.entities().unwrap();
        let dates = panel.dates().unwrap();
        let keys: Vec<(&String, &NaiveDate)> = entities.iter().zip(&dates).collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        let distinct: BTreeSet<usize> = rows.iter().map(|(e, _)| *e).collect();
        prop_assert_eq!(report.entities, distinct.len());
    }
}
