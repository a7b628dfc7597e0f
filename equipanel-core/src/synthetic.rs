//! Seeded synthetic sources for tests, benches and the demo command.
//!
//! Prices are a random walk on weekdays. Metadata covers every security but
//! one, so the unresolved-security path is always exercised. Disclosures are
//! a quarterly statement table and a monthly indicator snapshot whose ratios
//! are formatted as percentage text.

use crate::domain::column::date_column;
use crate::domain::{DisclosureSource, PanelError, SourceTable, SourceTables};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Security identifier of the price series that has no metadata row.
pub const ORPHAN_SECURITY: &str = "PLORPHAN0001";

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub entities: usize,
    pub start: NaiveDate,
    /// Calendar days covered, weekends included.
    pub days: usize,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            entities: 5,
            start: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap_or_default(),
            days: 365,
            seed: 42,
        }
    }
}

fn security_id(i: usize) -> String {
    format!("PLSYN{i:07}")
}

fn ticker(i: usize) -> String {
    format!("SYN{i}")
}

#[derive(Default)]
struct PriceRows {
    isin: Vec<String>,
    date: Vec<Option<NaiveDate>>,
    name: Vec<String>,
    currency: Vec<String>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume_units: Vec<f64>,
    num_transactions: Vec<f64>,
    trade_value: Vec<f64>,
    pct_change: Vec<f64>,
}

impl PriceRows {
    fn walk(&mut self, rng: &mut StdRng, security: &str, label: &str, spec: &SyntheticSpec) {
        let mut price = rng.gen_range(20.0..200.0_f64);
        for offset in 0..spec.days {
            let date = spec.start + Duration::days(offset as i64);
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let volume = rng.gen_range(1_000.0..50_000.0_f64).round();

            self.isin.push(security.to_string());
            self.date.push(Some(date));
            self.name.push(label.to_string());
            self.currency.push("PLN".to_string());
            self.open.push(open);
            self.high.push(open.max(close) * (1.0 + rng.gen_range(0.0..0.01)));
            self.low.push(open.min(close) * (1.0 - rng.gen_range(0.0..0.01)));
            self.close.push(close);
            self.volume_units.push(volume);
            self.num_transactions.push(rng.gen_range(5.0..500.0_f64).round());
            self.trade_value.push(close * volume / 1_000.0);
            // the exchange occasionally publishes a wrong change; mimic that
            let reported = if rng.gen_bool(0.05) { 0.0 } else { daily_return * 100.0 };
            self.pct_change.push(reported);
            price = close;
        }
    }

    fn into_table(self) -> Result<SourceTable, PanelError> {
        let frame = DataFrame::new(vec![
            Column::new("isin".into(), self.isin),
            date_column("date", &self.date)?,
            Column::new("name".into(), self.name),
            Column::new("currency".into(), self.currency),
            Column::new("open".into(), self.open),
            Column::new("high".into(), self.high),
            Column::new("low".into(), self.low),
            Column::new("close".into(), self.close),
            Column::new("volume_units".into(), self.volume_units),
            Column::new("num_transactions".into(), self.num_transactions),
            Column::new("trade_value".into(), self.trade_value),
            Column::new("pct_change".into(), self.pct_change),
        ])?;
        Ok(SourceTable::new("prices", frame))
    }
}

/// Generate a full source bundle. The same spec always yields the same tables.
pub fn generate_sources(spec: &SyntheticSpec) -> Result<SourceTables, PanelError> {
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let mut prices = PriceRows::default();
    for i in 0..spec.entities {
        prices.walk(&mut rng, &security_id(i), &format!("Synthetic {i} SA"), spec);
    }
    prices.walk(&mut rng, ORPHAN_SECURITY, "Orphan SA", spec);

    let ids = 0..spec.entities;
    let metadata = df!(
        "isin" => ids.clone().map(security_id).collect::<Vec<_>>(),
        "ticker" => ids.clone().map(ticker).collect::<Vec<_>>(),
        "name" => ids.clone().map(|i| format!("SYNTHETIC{i}")).collect::<Vec<_>>(),
        "sector" => ids.map(|i| ["banks", "energy", "retail"][i % 3]).collect::<Vec<_>>(),
    )?;

    Ok(SourceTables {
        prices: prices.into_table()?,
        metadata: SourceTable::new("metadata", metadata),
        disclosures: vec![
            balance_sheet(&mut rng, spec)?,
            profitability(&mut rng, spec)?,
        ],
    })
}

/// Quarterly statements, published on the 15th, with a date column named
/// `publication_date`.
fn balance_sheet(rng: &mut StdRng, spec: &SyntheticSpec) -> Result<DisclosureSource, PanelError> {
    let (mut tickers, mut dates, mut assets, mut equity) = (vec![], vec![], vec![], vec![]);
    for i in 0..spec.entities {
        let mut size = rng.gen_range(1e6..1e9_f64);
        for date in monthly_dates(spec).into_iter().step_by(3) {
            size *= 1.0 + rng.gen_range(-0.05..0.08);
            tickers.push(ticker(i));
            dates.push(Some(date));
            assets.push(size.round());
            equity.push((size * rng.gen_range(0.1..0.6)).round());
        }
    }
    let frame = DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        date_column("publication_date", &dates)?,
        Column::new("total_assets".into(), assets),
        Column::new("equity".into(), equity),
    ])?;
    Ok(DisclosureSource::new(
        SourceTable::new("balance_sheet", frame),
        "publication_date",
    ))
}

/// Monthly indicator snapshot; ratios are text such as `"7.61%"`.
fn profitability(rng: &mut StdRng, spec: &SyntheticSpec) -> Result<DisclosureSource, PanelError> {
    let (mut tickers, mut dates, mut roe, mut roa) = (vec![], vec![], vec![], vec![]);
    for i in 0..spec.entities {
        for date in monthly_dates(spec) {
            tickers.push(ticker(i));
            dates.push(Some(date));
            roe.push(format!("{:.2}%", rng.gen_range(-15.0..30.0_f64)));
            roa.push(format!("{:.2}%", rng.gen_range(-5.0..10.0_f64)));
        }
    }
    let frame = DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        date_column("date", &dates)?,
        Column::new("roe".into(), roe),
        Column::new("roa".into(), roa),
    ])?;
    Ok(DisclosureSource::new(SourceTable::new("profitability", frame), "date"))
}

/// The 15th of every month inside the covered range.
fn monthly_dates(spec: &SyntheticSpec) -> Vec<NaiveDate> {
    let end = spec.start + Duration::days(spec.days as i64);
    let mut out = Vec::new();
    let mut date = spec.start.with_day(15).unwrap_or(spec.start);
    while date < end {
        if date >= spec.start {
            out.push(date);
        }
        date = match date.checked_add_months(chrono::Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    out
}
