//! Lagged return and market-operation features.

use super::{add_features, names, FeatureRegistry, FeatureRole};
use crate::config::PipelineConfig;
use crate::domain::{DataKind, Panel};
use crate::error::PipelineError;
use polars::prelude::*;

/// `column` shifted back `t` rows within each entity.
pub fn lag_within_entities(column: &str, entity: &str, t: usize) -> Expr {
    col(column).shift(lit(t as i64)).over([col(entity)])
}

/// Adds `return_1d_t-{t}` for t in 1..=lags.
pub fn add_return_lags(
    panel: &mut Panel,
    config: &PipelineConfig,
    registry: &mut FeatureRegistry,
) -> Result<(), PipelineError> {
    let base = names::horizon_return(1);
    panel.require_kind(&base, DataKind::Number)?;
    let features = (1..=config.features.lags)
        .map(|t| (names::lagged(&base, t), lag_within_entities(&base, panel.entity_key(), t)))
        .collect();
    add_features(panel, registry, FeatureRole::ReturnLag, features)
}

/// Adds transaction count, volume units and rolling currency volume lagged
/// 1..=lags rows, interleaved per lag.
pub fn add_market_lags(
    panel: &mut Panel,
    config: &PipelineConfig,
    registry: &mut FeatureRegistry,
) -> Result<(), PipelineError> {
    let bases = [
        config.columns.num_transactions.as_str(),
        config.columns.volume_units.as_str(),
        names::CURRENCY_VOLUME,
    ];
    for base in bases {
        panel.require_kind(base, DataKind::Number)?;
    }
    let mut features = Vec::with_capacity(config.features.lags * bases.len());
    for t in 1..=config.features.lags {
        for base in bases {
            features.push((names::lagged(base, t), lag_within_entities(base, panel.entity_key(), t)));
        }
    }
    add_features(panel, registry, FeatureRole::MarketLag, features)
}
