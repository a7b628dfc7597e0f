//! Exponential Moving Average (EMA).
//!
//! EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2/(period+1),
//! seeded at index period-1 with the mean of the first `period` values.
//! Lookback: period - 1.

/// EMA of any series; MACD runs it over closes and over its own line.
///
/// A gap inside the seed window leaves the whole output missing. A gap after
/// the seed ends the series there.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let (seed_window, rest) = values.split_at(period);
    if seed_window.iter().any(|v| v.is_nan()) {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    out[period - 1] = prev;

    for (slot, &x) in out[period..].iter_mut().zip(rest) {
        if x.is_nan() {
            break;
        }
        prev = alpha * x + (1.0 - alpha) * prev;
        *slot = prev;
    }
    out
}
