//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and losses over close-to-close changes.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.

use super::{Indicator, PriceSeries};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, series: &PriceSeries<'_>) -> Vec<f64> {
        let close = series.close;
        let n = close.len();
        let mut result = vec![f64::NAN; n];
        if n <= self.period {
            return result;
        }

        // changes[i - 1] = close[i] - close[i - 1]; NaN if either side missing
        let changes: Vec<f64> = close.windows(2).map(|w| w[1] - w[0]).collect();

        let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
        for &ch in &changes[..self.period] {
            if ch.is_nan() {
                return result;
            }
            avg_gain += ch.max(0.0);
            avg_loss += (-ch).max(0.0);
        }
        let p = self.period as f64;
        avg_gain /= p;
        avg_loss /= p;
        result[self.period] = rsi_value(avg_gain, avg_loss);

        for (i, &ch) in changes.iter().enumerate().skip(self.period) {
            if ch.is_nan() {
                break;
            }
            avg_gain = (avg_gain * (p - 1.0) + ch.max(0.0)) / p;
            avg_loss = (avg_loss * (p - 1.0) + (-ch).max(0.0)) / p;
            result[i + 1] = rsi_value(avg_gain, avg_loss);
        }

        result
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn rsi_all_gains() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let result = Rsi::new(3).compute(&bars.series());
        assert_approx(result[3], 100.0, 1e-6);
        assert_approx(result[5], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let bars = make_bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let result = Rsi::new(3).compute(&bars.series());
        assert_approx(result[3], 0.0, 1e-6);
    }

    #[test]
    fn rsi_flat_is_neutral() {
        let bars = make_bars(&[10.0; 6]);
        let result = Rsi::new(3).compute(&bars.series());
        assert_approx(result[4], 50.0, 1e-9);
    }

    #[test]
    fn rsi_seed_value() {
        // changes +0.34, -0.25, -0.48: avg_gain = 0.34/3, avg_loss = 0.73/3
        let bars = make_bars(&[44.0, 44.34, 44.09, 43.61, 44.33]);
        let result = Rsi::new(3).compute(&bars.series());
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert_approx(result[3], 100.0 - 100.0 / (1.0 + 0.34 / 0.73), 1e-9);
        // next: gain 0.72 -> avg_gain = (0.34/3*2 + 0.72)/3, avg_loss = (0.73/3*2)/3
        let g = (0.34 / 3.0 * 2.0 + 0.72) / 3.0;
        let l = (0.73 / 3.0 * 2.0) / 3.0;
        assert_approx(result[4], 100.0 - 100.0 / (1.0 + g / l), 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let bars = make_bars(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let result = Rsi::new(3).compute(&bars.series());
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "RSI out of bounds at row {i}: {v}");
            }
        }
    }

    #[test]
    fn rsi_nan_in_seed_gives_all_nan() {
        let mut bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        bars.close[2] = f64::NAN;
        let result = Rsi::new(3).compute(&bars.series());
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_lookback() {
        assert_eq!(Rsi::new(14).lookback(), 14);
    }
}
