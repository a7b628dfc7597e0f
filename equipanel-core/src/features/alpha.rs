//! Technical alpha factors, computed per entity from its price history.
//!
//! - `alpha_rsi`: RSI of the close.
//! - `alpha_bb_hi` / `alpha_bb_lo`: log-compressed distance of the close to
//!   the upper and lower Bollinger bands.
//! - `alpha_atr`, `alpha_macd`: ATR and the MACD line, z-scored over the
//!   entity's whole series.
//!
//! The indicator kernels run per entity on plain slices; standardization is
//! a polars window over the entity.

use super::{names, per_entity_columns, push_feature, FeatureRegistry, FeatureRole};
use crate::config::{FeatureConfig, PipelineConfig};
use crate::domain::Panel;
use crate::error::PipelineError;
use crate::indicators::{Atr, Bollinger, Indicator, Macd, PriceSeries, Rsi};
use polars::prelude::*;

/// `ln(1 + (upper - close) / upper)`
pub fn band_distance_high(upper: f64, close: f64) -> f64 {
    ((upper - close) / upper).ln_1p()
}

/// `ln(1 + (close - lower) / close)`
pub fn band_distance_low(lower: f64, close: f64) -> f64 {
    ((close - lower) / close).ln_1p()
}

/// `(x - mean) / std` with sample std over the entity's non-null values.
/// A constant or single-value series becomes null.
pub fn zscore_within(column: &str, entity: &str) -> Expr {
    let x = col(column);
    let mean = x.clone().mean().over([col(entity)]);
    let std = x.clone().std(1).over([col(entity)]);
    when(std.clone().gt(lit(0.0)))
        .then((x - mean) / std)
        .otherwise(lit(NULL))
}

/// The five alpha series for one entity, in `names::ALPHAS` order. ATR and
/// MACD are raw here and standardized by [`add_alphas`].
pub fn entity_alphas(series: &PriceSeries<'_>, cfg: &FeatureConfig) -> Vec<Vec<f64>> {
    let rsi = Rsi::new(cfg.rsi_period).compute(series);
    let upper = Bollinger::upper(cfg.bollinger_period, cfg.bollinger_multiplier).compute(series);
    let lower = Bollinger::lower(cfg.bollinger_period, cfg.bollinger_multiplier).compute(series);
    let bb_hi = upper
        .iter()
        .zip(series.close)
        .map(|(&u, &c)| band_distance_high(u, c))
        .collect();
    let bb_lo = lower
        .iter()
        .zip(series.close)
        .map(|(&l, &c)| band_distance_low(l, c))
        .collect();
    let atr = Atr::new(cfg.atr_period).compute(series);
    let macd = Macd::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal).compute(series);
    vec![rsi, bb_hi, bb_lo, atr, macd]
}

pub fn add_alphas(
    panel: &mut Panel,
    config: &PipelineConfig,
    registry: &mut FeatureRegistry,
) -> Result<(), PipelineError> {
    let cols = &config.columns;
    let high = panel.numbers(&cols.high)?;
    let low = panel.numbers(&cols.low)?;
    let close = panel.numbers(&cols.close)?;
    let groups = panel.groups()?;

    let alphas = per_entity_columns(&groups, config.features.parallel, names::ALPHAS.len(), |rows| {
        let series = PriceSeries::new(&high[rows.clone()], &low[rows.clone()], &close[rows]);
        entity_alphas(&series, &config.features)
    });
    for (name, values) in names::ALPHAS.into_iter().zip(alphas) {
        push_feature(panel, registry, name.to_string(), FeatureRole::Alpha, &values)?;
    }

    let entity = panel.entity_key().to_string();
    panel.with_columns(
        [names::ALPHA_ATR, names::ALPHA_MACD]
            .into_iter()
            .map(|name| zscore_within(name, &entity).alias(name))
            .collect(),
    )?;
    Ok(())
}
