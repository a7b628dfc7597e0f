//! Feature Engine.
//!
//! Appends liquidity, return, lag, target, momentum, technical alpha and
//! calendar columns to the cleaned panel, drops rows that lack the history
//! (or the next observation) those columns need, then prunes raw and
//! intermediate columns.
//!
//! Series features are polars expressions partitioned with
//! `.over([entity])`, so windows, shifts and standardization never cross an
//! entity boundary. The indicator kernels behind the alphas run per entity
//! over the panel's `EntityGroups`; groups are contiguous and ordered, so
//! concatenating per-group results reproduces row order whether groups run
//! sequentially or on the rayon pool.

pub mod alpha;
pub mod calendar;
pub mod lags;
pub mod liquidity;
pub mod names;
pub mod returns;

use crate::config::PipelineConfig;
use crate::domain::column::number_column;
use crate::domain::{EntityGroups, Panel, PanelError};
use crate::error::PipelineError;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info};

pub use returns::WinsorBounds;

/// What an engineered column is. Drives row filtering and the exported
/// feature list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureRole {
    Liquidity,
    Return,
    ReturnLag,
    MarketLag,
    Target,
    Momentum,
    Alpha,
    Calendar,
}

impl FeatureRole {
    /// Rows missing a value in a column of this role are dropped.
    pub fn requires_value(self) -> bool {
        matches!(
            self,
            FeatureRole::Return
                | FeatureRole::ReturnLag
                | FeatureRole::Target
                | FeatureRole::Momentum
                | FeatureRole::Alpha
        )
    }
}

/// Engineered columns in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureRegistry {
    entries: Vec<(String, FeatureRole)>,
}

impl FeatureRegistry {
    pub fn register(&mut self, name: impl Into<String>, role: FeatureRole) {
        self.entries.push((name.into(), role));
    }

    pub fn role(&self, name: &str) -> Option<FeatureRole> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, role)| *role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureRole)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), *r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureReport {
    pub return_bounds: Vec<WinsorBounds>,
    pub target_bounds: Option<WinsorBounds>,
    pub rows_in: usize,
    /// Rows dropped because a return, momentum, alpha or target value is missing.
    pub rows_without_runway: usize,
    pub pruned_columns: Vec<String>,
    /// Engineered model inputs in the output, target excluded.
    pub feature_columns: Vec<String>,
    pub rows: usize,
    pub columns: usize,
}

/// Run every feature step in its fixed order.
pub fn engineer_features(
    mut panel: Panel,
    config: &PipelineConfig,
) -> Result<(Panel, FeatureReport), PipelineError> {
    let mut registry = FeatureRegistry::default();
    let mut report = FeatureReport {
        rows_in: panel.height(),
        ..FeatureReport::default()
    };

    liquidity::add_liquidity(&mut panel, config, &mut registry)?;
    report.return_bounds = returns::add_returns(&mut panel, config, &mut registry)?;
    lags::add_return_lags(&mut panel, config, &mut registry)?;
    lags::add_market_lags(&mut panel, config, &mut registry)?;
    report.target_bounds = Some(returns::add_target(&mut panel, config, &mut registry)?);
    returns::add_momentum(&mut panel, config, &mut registry)?;
    alpha::add_alphas(&mut panel, config, &mut registry)?;
    calendar::add_calendar(&mut panel, &mut registry)?;
    debug!(columns = registry.len(), "feature columns computed");

    let panel = drop_rows_without_runway(&panel, &registry)?;
    report.rows_without_runway = report.rows_in - panel.height();

    let (panel, pruned) = prune_columns(panel, config)?;
    report.pruned_columns = pruned;
    report.feature_columns = registry
        .iter()
        .filter(|(name, role)| *role != FeatureRole::Target && panel.has_column(name))
        .map(|(name, _)| name.to_string())
        .collect();
    report.rows = panel.height();
    report.columns = panel.width();

    info!(
        rows = report.rows,
        columns = report.columns,
        dropped_rows = report.rows_without_runway,
        features = report.feature_columns.len(),
        "features engineered"
    );
    Ok((panel, report))
}

/// Keep rows where every value-requiring engineered column is present.
pub fn drop_rows_without_runway(panel: &Panel, registry: &FeatureRegistry) -> Result<Panel, PipelineError> {
    let present = registry
        .iter()
        .filter(|(name, role)| role.requires_value() && panel.has_column(name))
        .map(|(name, _)| col(name).is_not_null())
        .reduce(|a, b| a.and(b));
    match present {
        Some(predicate) => Ok(panel.filter(predicate)?),
        None => Ok(panel.clone()),
    }
}

/// Remove raw market fields, raw liquidity fields and horizon returns.
pub fn prune_columns(
    mut panel: Panel,
    config: &PipelineConfig,
) -> Result<(Panel, Vec<String>), PipelineError> {
    let mut doomed: Vec<String> = config
        .columns
        .raw_market_fields()
        .into_iter()
        .map(str::to_string)
        .collect();
    doomed.push(names::CURRENCY_VOLUME.to_string());
    doomed.push(names::CURRENCY_VOLUME_RANK.to_string());
    doomed.extend(config.features.return_horizons.iter().map(|&h| names::horizon_return(h)));
    let pruned = panel.drop_columns(&doomed)?;
    Ok((panel, pruned))
}

/// Evaluate `features` against the panel in one pass and record their role.
pub(crate) fn add_features(
    panel: &mut Panel,
    registry: &mut FeatureRegistry,
    role: FeatureRole,
    features: Vec<(String, Expr)>,
) -> Result<(), PipelineError> {
    if let Some((name, _)) = features.iter().find(|(name, _)| panel.has_column(name)) {
        return Err(PanelError::DuplicateColumn(name.clone()).into());
    }
    let exprs = features
        .iter()
        .map(|(name, expr)| expr.clone().alias(name.as_str()))
        .collect();
    panel.with_columns(exprs)?;
    for (name, _) in features {
        registry.register(name, role);
    }
    Ok(())
}

/// Append a kernel-computed column (`NaN` as missing) and record its role.
pub(crate) fn push_feature(
    panel: &mut Panel,
    registry: &mut FeatureRegistry,
    name: String,
    role: FeatureRole,
    values: &[f64],
) -> Result<(), PipelineError> {
    panel.push_column(number_column(&name, values))?;
    registry.register(name, role);
    Ok(())
}

/// Run `f` over every entity's row range and concatenate the `width` output
/// series group by group.
pub(crate) fn per_entity_columns<F>(
    groups: &EntityGroups,
    parallel: bool,
    width: usize,
    f: F,
) -> Vec<Vec<f64>>
where
    F: Fn(Range<usize>) -> Vec<Vec<f64>> + Sync + Send,
{
    let blocks: Vec<Vec<Vec<f64>>> = if parallel {
        groups
            .as_slice()
            .par_iter()
            .map(|g| f(g.rows.clone()))
            .collect()
    } else {
        groups.iter().map(|g| f(g.rows.clone())).collect()
    };

    let mut out = vec![Vec::new(); width];
    for block in blocks {
        for (dst, src) in out.iter_mut().zip(block) {
            dst.extend(src);
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::column::date_column;
    use crate::domain::Panel;
    use chrono::NaiveDate;
    use polars::prelude::*;

    /// Panel of consecutive days per entity, with close from the given series
    /// and high/low/volume derived from it.
    pub fn price_panel(series: &[(&str, Vec<f64>)]) -> Panel {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut entities = Vec::new();
        let mut dates = Vec::new();
        let mut close = Vec::new();
        for (entity, closes) in series {
            for (i, &c) in closes.iter().enumerate() {
                entities.push(entity.to_string());
                dates.push(Some(start + chrono::Duration::days(i as i64)));
                close.push(c);
            }
        }
        let n = close.len();
        let high: Vec<f64> = close.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        let volume: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let trades: Vec<f64> = (0..n).map(|i| 10.0 + (i % 7) as f64).collect();
        let frame = DataFrame::new(vec![
            Column::new("ticker".into(), entities),
            date_column("date", &dates).unwrap(),
            Column::new("open".into(), close.clone()),
            Column::new("high".into(), high),
            Column::new("low".into(), low),
            Column::new("close".into(), close),
            Column::new("volume_units".into(), volume),
            Column::new("num_transactions".into(), trades),
            Column::new("pct_change".into(), vec![0.0; n]),
        ])
        .unwrap();
        Panel::new(frame, "ticker", "date").unwrap()
    }

    /// Deterministic wavy close series.
    pub fn wave(n: usize, base: f64) -> Vec<f64> {
        (0..n)
            .map(|i| base + (i as f64 * 0.37).sin() * 3.0 + i as f64 * 0.05)
            .collect()
    }
}
