//! Column names produced by the feature engine.

pub const CURRENCY_VOLUME: &str = "currency_vol";
pub const CURRENCY_VOLUME_RANK: &str = "currency_vol_rank";
pub const TARGET: &str = "target_next_day_return";

pub const ALPHA_RSI: &str = "alpha_rsi";
pub const ALPHA_BB_HIGH: &str = "alpha_bb_hi";
pub const ALPHA_BB_LOW: &str = "alpha_bb_lo";
pub const ALPHA_ATR: &str = "alpha_atr";
pub const ALPHA_MACD: &str = "alpha_macd";
pub const ALPHAS: [&str; 5] = [ALPHA_RSI, ALPHA_BB_HIGH, ALPHA_BB_LOW, ALPHA_ATR, ALPHA_MACD];

pub const WEEKDAY: &str = "weekday";
pub const MONTH: &str = "month";
pub const DAY_IN_MONTH: &str = "day_in_month";

pub fn horizon_return(horizon: usize) -> String {
    format!("return_{horizon}d")
}

/// `base` shifted back by `t` observations.
pub fn lagged(base: &str, t: usize) -> String {
    format!("{base}_t-{t}")
}

pub fn momentum(horizon: usize) -> String {
    format!("momentum_{horizon}d")
}

pub fn momentum_spread(short: usize, long: usize) -> String {
    format!("momentum_{short}_{long}d")
}
