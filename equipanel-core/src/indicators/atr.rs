//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (alpha = 1/period).
//! Lookback: period (row 0 has no previous close).

use super::{Indicator, PriceSeries};

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range per row. Row 0 is high - low.
pub fn true_range(series: &PriceSeries<'_>) -> Vec<f64> {
    let n = series.len();
    let mut tr = Vec::with_capacity(n);
    for i in 0..n {
        let (h, l) = (series.high[i], series.low[i]);
        let value = if i == 0 {
            h - l
        } else {
            let pc = series.close[i - 1];
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        };
        // f64::max ignores a NaN operand; keep missing inputs missing
        let missing = h.is_nan() || l.is_nan() || (i > 0 && series.close[i - 1].is_nan());
        tr.push(if missing { f64::NAN } else { value });
    }
    tr
}

/// Wilder smoothing. Seeds with the mean of the first run of `period`
/// consecutive valid values; a later NaN ends the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut run = 0usize;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        run = if v.is_nan() { 0 } else { run + 1 };
        if run == period {
            seed_end = Some(i);
            break;
        }
    }
    let Some(seed_end) = seed_end else {
        return result;
    };

    let p = period as f64;
    let mut prev = values[seed_end + 1 - period..=seed_end].iter().sum::<f64>() / p;
    result[seed_end] = prev;
    for i in seed_end + 1..n {
        if values[i].is_nan() {
            break;
        }
        prev = (prev * (p - 1.0) + values[i]) / p;
        result[i] = prev;
    }

    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, series: &PriceSeries<'_>) -> Vec<f64> {
        let mut tr = true_range(series);
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}
