//! Immutable pipeline configuration.
//!
//! Every threshold, window and column name used by the stages lives here.
//! Defaults reproduce the constants of the exchange dataset the pipeline was
//! built for; a config is validated once and then passed by reference.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Column names the stages rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceColumns {
    /// Entity identifier (ticker), resolved through the metadata table.
    pub entity: String,
    /// Security identifier shared by prices and metadata.
    pub security: String,
    /// Common effective-date key.
    pub date: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume_units: String,
    pub num_transactions: String,
    pub trade_value: String,
    pub pct_change: String,
}

impl Default for PriceColumns {
    fn default() -> Self {
        Self {
            entity: "ticker".into(),
            security: "isin".into(),
            date: "date".into(),
            open: "open".into(),
            high: "high".into(),
            low: "low".into(),
            close: "close".into(),
            volume_units: "volume_units".into(),
            num_transactions: "num_transactions".into(),
            trade_value: "trade_value".into(),
            pct_change: "pct_change".into(),
        }
    }
}

impl PriceColumns {
    /// Raw price-table fields that never reach the model.
    pub fn raw_market_fields(&self) -> Vec<&str> {
        vec![
            self.open.as_str(),
            self.high.as_str(),
            self.low.as_str(),
            self.close.as_str(),
            self.pct_change.as_str(),
            self.num_transactions.as_str(),
            self.volume_units.as_str(),
            self.trade_value.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Columns with a larger share of missing cells are dropped.
    pub max_missing_fraction: f64,
    /// Columns with no modeling value, dropped when present.
    pub drop_columns: Vec<String>,
    /// Recomputed changes spanning more calendar days than this are reported.
    pub gap_warning_days: i64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            max_missing_fraction: 0.5,
            drop_columns: vec![
                "currency".into(),
                "name_x".into(),
                "name_y".into(),
                "isin".into(),
            ],
            gap_warning_days: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub liquidity_window: usize,
    pub return_horizons: Vec<usize>,
    pub momentum_horizons: Vec<usize>,
    /// (short, long): an extra factor `return_{long}d - return_{short}d`.
    pub momentum_spread: (usize, usize),
    pub lags: usize,
    pub winsor_lower: f64,
    pub winsor_upper: f64,
    pub rsi_period: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub atr_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Compute per-entity features on the rayon pool.
    pub parallel: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            liquidity_window: 21,
            return_horizons: vec![1, 2, 3, 5, 10],
            momentum_horizons: vec![2, 3, 5, 10],
            momentum_spread: (2, 10),
            lags: 9,
            winsor_lower: 0.01,
            winsor_upper: 0.99,
            rsi_period: 14,
            bollinger_period: 5,
            bollinger_multiplier: 2.0,
            atr_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: PriceColumns,
    pub clean: CleanConfig,
    pub features: FeatureConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.clean;
        if !(0.0..=1.0).contains(&c.max_missing_fraction) {
            return Err(invalid(
                "clean.max_missing_fraction",
                format!("{} is outside [0, 1]", c.max_missing_fraction),
            ));
        }
        if c.gap_warning_days < 1 {
            return Err(invalid("clean.gap_warning_days", "must be at least 1"));
        }

        let f = &self.features;
        if f.return_horizons.is_empty() {
            return Err(invalid("features.return_horizons", "must not be empty"));
        }
        if f.return_horizons.contains(&0) {
            return Err(invalid("features.return_horizons", "horizons must be >= 1"));
        }
        if !f.return_horizons.contains(&1) {
            return Err(invalid(
                "features.return_horizons",
                "the 1-day horizon is required for lags, momentum and the target",
            ));
        }
        for h in &f.momentum_horizons {
            if !f.return_horizons.contains(h) {
                return Err(invalid(
                    "features.momentum_horizons",
                    format!("horizon {h} is not a return horizon"),
                ));
            }
        }
        let (short, long) = f.momentum_spread;
        if !f.return_horizons.contains(&short) || !f.return_horizons.contains(&long) {
            return Err(invalid(
                "features.momentum_spread",
                format!("({short}, {long}) must both be return horizons"),
            ));
        }
        if !(0.0..=1.0).contains(&f.winsor_lower)
            || !(0.0..=1.0).contains(&f.winsor_upper)
            || f.winsor_lower >= f.winsor_upper
        {
            return Err(invalid(
                "features.winsor_lower",
                format!(
                    "bounds ({}, {}) must satisfy 0 <= lower < upper <= 1",
                    f.winsor_lower, f.winsor_upper
                ),
            ));
        }
        let periods = [
            ("features.liquidity_window", f.liquidity_window),
            ("features.rsi_period", f.rsi_period),
            ("features.bollinger_period", f.bollinger_period),
            ("features.atr_period", f.atr_period),
            ("features.macd_fast", f.macd_fast),
            ("features.macd_slow", f.macd_slow),
            ("features.macd_signal", f.macd_signal),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(invalid(field, "must be >= 1"));
            }
        }
        if f.macd_fast >= f.macd_slow {
            return Err(invalid(
                "features.macd_fast",
                format!("fast period {} must be below slow period {}", f.macd_fast, f.macd_slow),
            ));
        }
        Ok(())
    }
}
