//! Bollinger Bands: moving average +/- a multiple of the rolling deviation.
//!
//! Each band is its own Indicator instance around the SMA of the close:
//! - Upper: sma + mult * stddev(close, period)
//! - Lower: sma - mult * stddev(close, period)
//!
//! Population stddev (divide by N). Lookback: period - 1.

use super::sma::sma_of_series;
use super::{Indicator, PriceSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(band: BollingerBand, period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Upper, period, multiplier)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Lower, period, multiplier)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, series: &PriceSeries<'_>) -> Vec<f64> {
        let close = series.close;
        let middle = sma_of_series(close, self.period);
        let sign = match self.band {
            BollingerBand::Upper => 1.0,
            BollingerBand::Lower => -1.0,
        };
        middle
            .iter()
            .enumerate()
            .map(|(i, &mean)| {
                if mean.is_nan() {
                    return f64::NAN;
                }
                let window = &close[i + 1 - self.period..=i];
                let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>()
                    / self.period as f64;
                mean + sign * self.multiplier * variance.sqrt()
            })
            .collect()
    }
}
