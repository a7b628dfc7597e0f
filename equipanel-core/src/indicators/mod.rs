//! Technical indicators over one entity's price history.
//!
//! Indicators are pure functions: price history in, numeric series of the
//! same length out. The first `lookback()` values are `f64::NAN` (warmup).
//!
//! # Look-ahead contamination guard
//! No indicator value at row t may depend on prices from row t+1 or later.
//! Every indicator must pass the truncated-vs-full series test.
//!
//! Multi-series indicators (Bollinger) are exposed as separate named
//! instances per band, keeping the single-series trait unchanged. The moving
//! averages are plain series functions shared by the other kernels.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::sma_of_series;
pub use ema::ema_of_series;

/// Borrowed high/low/close columns of one entity, ordered by date.
#[derive(Debug, Clone, Copy)]
pub struct PriceSeries<'a> {
    pub high: &'a [f64],
    pub low: &'a [f64],
    pub close: &'a [f64],
}

impl<'a> PriceSeries<'a> {
    pub fn new(high: &'a [f64], low: &'a [f64], close: &'a [f64]) -> Self {
        debug_assert!(high.len() == close.len() && low.len() == close.len());
        Self { high, low, close }
    }

    /// Close-only series; high and low alias the close.
    pub fn from_close(close: &'a [f64]) -> Self {
        Self {
            high: close,
            low: close,
            close,
        }
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// Trait for indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "atr_14").
    fn name(&self) -> &str;

    /// Number of rows needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire series.
    fn compute(&self, series: &PriceSeries<'_>) -> Vec<f64>;
}

/// Owned OHLC columns for tests.
#[cfg(test)]
pub struct TestBars {
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

#[cfg(test)]
impl TestBars {
    pub fn series(&self) -> PriceSeries<'_> {
        PriceSeries::new(&self.high, &self.low, &self.close)
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first row),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> TestBars {
    let mut high = Vec::with_capacity(closes.len());
    let mut low = Vec::with_capacity(closes.len());
    for (i, &close) in closes.iter().enumerate() {
        let open = if i == 0 { close } else { closes[i - 1] };
        high.push(open.max(close) + 1.0);
        low.push(open.min(close) - 1.0);
    }
    TestBars {
        high,
        low,
        close: closes.to_vec(),
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
