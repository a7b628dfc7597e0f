//! Horizon returns, the next-day target and momentum factors.
//!
//! Winsorization bounds are quantiles of each horizon's return distribution
//! pooled over all entities and the whole sample.

use super::{add_features, names, FeatureRegistry, FeatureRole};
use crate::config::PipelineConfig;
use crate::domain::{DataKind, Panel};
use crate::error::PipelineError;
use polars::prelude::*;
use serde::Serialize;

/// Clip bounds applied to one horizon. `NaN` when the horizon has no
/// observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinsorBounds {
    pub horizon: usize,
    pub lower: f64,
    pub upper: f64,
}

/// Relative change of `close` over `horizon` rows. Partition the result by
/// entity with `.over`.
pub fn relative_change(close: &str, horizon: usize) -> Expr {
    col(close) / col(close).shift(lit(horizon as i64)) - lit(1.0)
}

/// Linear-interpolated quantile bounds of a column, nulls ignored.
pub fn winsor_bounds(frame: &DataFrame, column: &str, lower_q: f64, upper_q: f64) -> PolarsResult<(f64, f64)> {
    let bounds = frame
        .clone()
        .lazy()
        .select([
            col(column).quantile(lit(lower_q), QuantileMethod::Linear).alias("lower"),
            col(column).quantile(lit(upper_q), QuantileMethod::Linear).alias("upper"),
        ])
        .collect()?;
    let lower = bounds.column("lower")?.f64()?.get(0).unwrap_or(f64::NAN);
    let upper = bounds.column("upper")?.f64()?.get(0).unwrap_or(f64::NAN);
    Ok((lower, upper))
}

/// Clip into `[lower, upper]`, leaving nulls as they are. `NaN` bounds leave
/// the values untouched.
pub fn clip_to(value: Expr, lower: f64, upper: f64) -> Expr {
    if lower.is_nan() || upper.is_nan() {
        return value;
    }
    when(value.clone().lt(lit(lower)))
        .then(lit(lower))
        .when(value.clone().gt(lit(upper)))
        .then(lit(upper))
        .otherwise(value)
}

/// `(1 + r)^(1/h) - 1`: the constant daily rate compounding to `r` over `h` rows.
pub fn geometric_daily_rate(r: Expr, horizon: usize) -> Expr {
    if horizon == 1 {
        return r;
    }
    (lit(1.0) + r).pow(lit(1.0 / horizon as f64)) - lit(1.0)
}

/// Pooled winsorization bounds of every horizon's per-entity change.
fn pooled_bounds(
    panel: &Panel,
    config: &PipelineConfig,
    horizons: &[usize],
) -> Result<Vec<WinsorBounds>, PipelineError> {
    let f = &config.features;
    let close = config.columns.close.as_str();
    panel.require_kind(close, DataKind::Number)?;

    let raw_name = |h: usize| format!("raw_{h}");
    let raw: Vec<Expr> = horizons
        .iter()
        .map(|&h| {
            relative_change(close, h)
                .over([col(panel.entity_key())])
                .alias(raw_name(h))
        })
        .collect();
    let frame = panel.lazy().select(raw).collect()?;

    horizons
        .iter()
        .map(|&h| {
            let (lower, upper) = winsor_bounds(&frame, &raw_name(h), f.winsor_lower, f.winsor_upper)?;
            Ok(WinsorBounds { horizon: h, lower, upper })
        })
        .collect()
}

/// Adds `return_{h}d` for every configured horizon.
pub fn add_returns(
    panel: &mut Panel,
    config: &PipelineConfig,
    registry: &mut FeatureRegistry,
) -> Result<Vec<WinsorBounds>, PipelineError> {
    let bounds = pooled_bounds(panel, config, &config.features.return_horizons)?;
    let close = config.columns.close.as_str();
    let entity = panel.entity_key().to_string();

    let features = bounds
        .iter()
        .map(|b| {
            let clipped = clip_to(relative_change(close, b.horizon), b.lower, b.upper);
            let daily = geometric_daily_rate(clipped, b.horizon).over([col(entity.as_str())]);
            (names::horizon_return(b.horizon), daily)
        })
        .collect();
    add_features(panel, registry, FeatureRole::Return, features)?;
    Ok(bounds)
}

/// Adds the next-day target: the winsorized 1-row change of the following
/// observation. The last row of each entity has no target.
pub fn add_target(
    panel: &mut Panel,
    config: &PipelineConfig,
    registry: &mut FeatureRegistry,
) -> Result<WinsorBounds, PipelineError> {
    let bounds = pooled_bounds(panel, config, &[1])?;
    let b = bounds.first().copied().unwrap_or(WinsorBounds {
        horizon: 1,
        lower: f64::NAN,
        upper: f64::NAN,
    });
    let target = clip_to(relative_change(&config.columns.close, 1), b.lower, b.upper)
        .shift(lit(-1))
        .over([col(panel.entity_key())]);
    add_features(
        panel,
        registry,
        FeatureRole::Target,
        vec![(names::TARGET.to_string(), target)],
    )?;
    Ok(b)
}

/// Adds `momentum_{h}d = return_{h}d - return_1d` per momentum horizon and
/// the fixed `return_{long}d - return_{short}d` spread.
pub fn add_momentum(
    panel: &mut Panel,
    config: &PipelineConfig,
    registry: &mut FeatureRegistry,
) -> Result<(), PipelineError> {
    let f = &config.features;
    let diff = |long: usize, short: usize| col(names::horizon_return(long)) - col(names::horizon_return(short));

    let mut features: Vec<(String, Expr)> = f
        .momentum_horizons
        .iter()
        .map(|&h| (names::momentum(h), diff(h, 1)))
        .collect();
    let (short, long) = f.momentum_spread;
    features.push((names::momentum_spread(short, long), diff(long, short)));
    add_features(panel, registry, FeatureRole::Momentum, features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::price_panel;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    fn no_clip() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.features.winsor_lower = 0.0;
        config.features.winsor_upper = 1.0;
        config
    }

    #[test]
    fn geometric_rate_compounds_back() {
        let df = df!("r" => &[0.21, 0.05]).unwrap();
        let out = df
            .lazy()
            .select([
                geometric_daily_rate(col("r"), 2).alias("two"),
                geometric_daily_rate(col("r"), 1).alias("one"),
            ])
            .collect()
            .unwrap();
        approx(out.column("two").unwrap().f64().unwrap().get(0).unwrap(), 0.1);
        approx(out.column("one").unwrap().f64().unwrap().get(1).unwrap(), 0.05);
    }

    #[test]
    fn clip_leaves_nulls_and_inner_values() {
        let df = df!("x" => &[Some(-5.0), None, Some(0.5), Some(9.0)]).unwrap();
        let out = df
            .lazy()
            .select([clip_to(col("x"), 0.0, 1.0).alias("x")])
            .collect()
            .unwrap();
        let x: Vec<Option<f64>> = out.column("x").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(x, vec![Some(0.0), None, Some(0.5), Some(1.0)]);
    }

    #[test]
    fn returns_are_per_entity() {
        let mut panel = price_panel(&[("AAA", vec![100.0, 110.0, 121.0]), ("BBB", vec![10.0, 5.0])]);
        let mut registry = FeatureRegistry::default();
        add_returns(&mut panel, &no_clip(), &mut registry).unwrap();

        let r1 = panel.numbers("return_1d").unwrap();
        assert!(r1[0].is_nan());
        approx(r1[1], 0.1);
        assert!(r1[3].is_nan()); // BBB's first row does not see AAA's close
        approx(r1[4], -0.5);
        let r2 = panel.numbers("return_2d").unwrap();
        approx(r2[2], 0.1); // 21% over two rows
        assert!(r2[4].is_nan());
    }

    #[test]
    fn winsorized_returns_stay_in_bounds() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 + ((i * 37) % 23) as f64).collect();
        let mut panel = price_panel(&[("AAA", closes)]);
        let mut registry = FeatureRegistry::default();
        let config = PipelineConfig::default();
        let bounds = add_returns(&mut panel, &config, &mut registry).unwrap();

        let b1 = bounds[0];
        assert!(b1.lower < b1.upper);
        let r1 = panel.numbers("return_1d").unwrap();
        for &r in r1.iter().filter(|r| !r.is_nan()) {
            assert!(r >= b1.lower - 1e-12 && r <= b1.upper + 1e-12);
        }
    }

    #[test]
    fn target_is_next_rows_change() {
        let mut panel = price_panel(&[("AAA", vec![100.0, 102.0, 99.0]), ("BBB", vec![10.0, 11.0])]);
        let mut registry = FeatureRegistry::default();
        add_target(&mut panel, &no_clip(), &mut registry).unwrap();

        let target = panel.numbers(names::TARGET).unwrap();
        approx(target[0], 0.02);
        approx(target[1], 99.0 / 102.0 - 1.0);
        assert!(target[2].is_nan()); // no next row within AAA
        approx(target[3], 0.1);
        assert!(target[4].is_nan());
        assert_eq!(registry.role(names::TARGET), Some(FeatureRole::Target));
    }

    #[test]
    fn momentum_is_return_difference() {
        let closes: Vec<f64> = (0..15).map(|i| 50.0 + (i as f64).sqrt()).collect();
        let mut panel = price_panel(&[("AAA", closes)]);
        let mut registry = FeatureRegistry::default();
        let config = no_clip();
        add_returns(&mut panel, &config, &mut registry).unwrap();
        add_momentum(&mut panel, &config, &mut registry).unwrap();

        let r1 = panel.numbers("return_1d").unwrap();
        let r2 = panel.numbers("return_2d").unwrap();
        let r10 = panel.numbers("return_10d").unwrap();
        let m2 = panel.numbers("momentum_2d").unwrap();
        let spread = panel.numbers("momentum_2_10d").unwrap();
        approx(m2[12], r2[12] - r1[12]);
        approx(spread[12], r10[12] - r2[12]);
        assert!(spread[9].is_nan());
    }
}
