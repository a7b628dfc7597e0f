//! Moving Average Convergence/Divergence.
//!
//! MACD line = EMA(close, fast) - EMA(close, slow). The signal line is an
//! EMA of the MACD line; the line is reported only once the signal is
//! defined, so the warmup matches a charting package that plots both.
//! Lookback: (slow - 1) + (signal - 1).

use super::ema::ema_of_series;
use super::{Indicator, PriceSeries};

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_line_{fast}_{slow}_{signal}"),
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.slow - 1) + (self.signal - 1)
    }

    fn compute(&self, series: &PriceSeries<'_>) -> Vec<f64> {
        let n = series.len();
        let fast = ema_of_series(series.close, self.fast);
        let slow = ema_of_series(series.close, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

        let mut result = vec![f64::NAN; n];
        let start = self.slow - 1;
        if n <= start {
            return result;
        }
        let signal_tail = ema_of_series(&line[start..], self.signal);

        for (offset, sig) in signal_tail.iter().enumerate() {
            if !sig.is_nan() {
                result[start + offset] = line[start + offset];
            }
        }
        result
    }
}
