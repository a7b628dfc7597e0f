//! Liquidity: trailing mean of traded currency value and its daily
//! cross-sectional rank.

use super::{add_features, names, FeatureRegistry, FeatureRole};
use crate::config::PipelineConfig;
use crate::domain::{DataKind, Panel};
use crate::error::PipelineError;
use polars::prelude::*;

/// Mean of `close * volume_units` over the last `window` rows of the entity.
/// Rows before a full window are null.
pub fn currency_volume(close: &str, volume: &str, entity: &str, window: usize) -> Expr {
    (col(close) * col(volume))
        .rolling_mean(RollingOptionsFixedWindow {
            window_size: window,
            min_periods: window,
            ..Default::default()
        })
        .over([col(entity)])
}

/// Descending rank of `value` among the rows sharing a date; ties share the
/// average rank and nulls stay null.
pub fn rank_by_date(value: &str, date: &str) -> Expr {
    col(value)
        .rank(
            RankOptions {
                method: RankMethod::Average,
                descending: true,
            },
            None,
        )
        .over([col(date)])
}

/// Adds the rolling currency volume and its rank among entities on the same
/// date.
pub fn add_liquidity(
    panel: &mut Panel,
    config: &PipelineConfig,
    registry: &mut FeatureRegistry,
) -> Result<(), PipelineError> {
    let cols = &config.columns;
    panel.require_kind(&cols.close, DataKind::Number)?;
    panel.require_kind(&cols.volume_units, DataKind::Number)?;

    let traded = currency_volume(
        &cols.close,
        &cols.volume_units,
        panel.entity_key(),
        config.features.liquidity_window,
    );
    add_features(
        panel,
        registry,
        FeatureRole::Liquidity,
        vec![(names::CURRENCY_VOLUME.to_string(), traded)],
    )?;

    let rank = rank_by_date(names::CURRENCY_VOLUME, panel.date_key());
    add_features(
        panel,
        registry,
        FeatureRole::Liquidity,
        vec![(names::CURRENCY_VOLUME_RANK.to_string(), rank)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::price_panel;

    #[test]
    fn ranks_within_each_date() {
        let df = df!(
            "date" => &[1, 2, 1, 2, 1],
            "value" => &[Some(5.0), Some(1.0), Some(9.0), None, Some(5.0)]
        )
        .unwrap();
        let ranked = df
            .lazy()
            .select([rank_by_date("value", "date").cast(DataType::Float64).alias("rank")])
            .collect()
            .unwrap();
        let ranks = ranked.column("rank").unwrap().f64().unwrap();
        assert_eq!(ranks.get(2), Some(1.0));
        assert_eq!(ranks.get(0), Some(2.5));
        assert_eq!(ranks.get(4), Some(2.5));
        assert_eq!(ranks.get(1), Some(1.0));
        assert_eq!(ranks.get(3), None);
    }

    #[test]
    fn rolling_mean_needs_full_window() {
        let mut config = PipelineConfig::default();
        config.features.liquidity_window = 3;
        let mut panel = price_panel(&[
            ("AAA", vec![10.0, 10.0, 10.0, 20.0]),
            ("BBB", vec![1.0, 1.0, 1.0, 1.0]),
        ]);
        let mut registry = FeatureRegistry::default();
        add_liquidity(&mut panel, &config, &mut registry).unwrap();
        let traded = panel.numbers(names::CURRENCY_VOLUME).unwrap();
        // volume_units in the helper panel is 100 + row
        assert!(traded[1].is_nan());
        assert!((traded[2] - 10.0 * (100.0 + 101.0 + 102.0) / 3.0).abs() < 1e-9);
        assert!(traded[5].is_nan()); // BBB window restarts
        let rank = panel.numbers(names::CURRENCY_VOLUME_RANK).unwrap();
        assert_eq!(rank[2], 1.0);
        assert_eq!(rank[6], 2.0);
        assert_eq!(registry.role(names::CURRENCY_VOLUME), Some(FeatureRole::Liquidity));
    }
}
