//! Panel Cleaner.
//!
//! Step order is fixed: sparse columns, superfluous columns, percentage
//! change recomputation, percentage-literal normalization. Each step relies
//! on the columns and kinds left by the previous one.

use crate::config::PipelineConfig;
use crate::domain::column::column_dates;
use crate::domain::{DataKind, Panel};
use crate::error::PipelineError;
use crate::percent::{cast_text_column, ColumnCast};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

/// A recomputed change whose previous observation is further back than the
/// configured gap threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarGap {
    pub entity: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub sparse_columns: Vec<String>,
    pub superfluous_columns: Vec<String>,
    /// First observation of each entity, which has no previous close.
    pub rows_without_change: usize,
    pub gaps: Vec<CalendarGap>,
    pub normalized_columns: Vec<String>,
    /// Text columns that stayed text because some cell is not numeric.
    pub text_columns: Vec<String>,
    pub rows: usize,
    pub columns: usize,
}

pub fn clean_panel(
    mut panel: Panel,
    config: &PipelineConfig,
) -> Result<(Panel, CleanReport), PipelineError> {
    let mut report = CleanReport {
        sparse_columns: drop_sparse_columns(&mut panel, config.clean.max_missing_fraction)?,
        superfluous_columns: panel.drop_columns(&config.clean.drop_columns)?,
        ..CleanReport::default()
    };

    let before = panel.height();
    let (panel, gaps) = recompute_pct_change(panel, config)?;
    report.rows_without_change = before - panel.height();
    report.gaps = gaps;

    let (panel, normalized, text) = normalize_percentages(panel)?;
    report.normalized_columns = normalized;
    report.text_columns = text;
    report.rows = panel.height();
    report.columns = panel.width();

    info!(
        rows = report.rows,
        columns = report.columns,
        dropped = report.sparse_columns.len() + report.superfluous_columns.len(),
        normalized = report.normalized_columns.len(),
        "panel cleaned"
    );
    Ok((panel, report))
}

/// Drop every column whose null fraction exceeds `max_fraction`.
pub fn drop_sparse_columns(panel: &mut Panel, max_fraction: f64) -> Result<Vec<String>, PipelineError> {
    let height = panel.height();
    if height == 0 {
        return Ok(Vec::new());
    }
    let mut sparse = Vec::new();
    for name in panel.column_names() {
        let nulls = panel.frame().column(&name)?.null_count();
        if nulls as f64 / height as f64 > max_fraction {
            sparse.push(name);
        }
    }
    if !sparse.is_empty() {
        warn!(columns = ?sparse, max_fraction, "dropping sparse columns");
    }
    Ok(panel.drop_columns(&sparse)?)
}

const GAP_DAYS: &str = "__gap_days";

/// Replace the percentage-change column with `(close_t / close_{t-1} - 1) * 100`
/// per entity and drop each entity's first row.
///
/// A change spanning more than `gap_warning_days` calendar days is kept but
/// reported.
pub fn recompute_pct_change(
    panel: Panel,
    config: &PipelineConfig,
) -> Result<(Panel, Vec<CalendarGap>), PipelineError> {
    let cols = &config.columns;
    panel.require_kind(&cols.close, DataKind::Number)?;
    let entity = col(panel.entity_key());
    let day = col(panel.date_key()).cast(DataType::Int32);
    let close = col(cols.close.as_str());

    let frame = panel
        .lazy()
        .with_columns([
            ((close.clone() / close.shift(lit(1)) - lit(1.0)) * lit(100.0))
                .over([entity.clone()])
                .alias(cols.pct_change.as_str()),
            (day.clone() - day.shift(lit(1))).over([entity]).alias(GAP_DAYS),
        ])
        .collect()?;

    let gaps = calendar_gaps(&frame, &panel, config.clean.gap_warning_days)?;
    if !gaps.is_empty() {
        warn!(
            count = gaps.len(),
            threshold_days = config.clean.gap_warning_days,
            "percentage changes span calendar gaps"
        );
    }

    let frame = frame
        .lazy()
        .filter(col(cols.pct_change.as_str()).is_not_null())
        .drop([GAP_DAYS])
        .collect()?;
    Ok((panel.with_frame(frame)?, gaps))
}

fn calendar_gaps(frame: &DataFrame, panel: &Panel, threshold: i64) -> Result<Vec<CalendarGap>, PipelineError> {
    let rows = frame
        .clone()
        .lazy()
        .filter(col(GAP_DAYS).cast(DataType::Int64).gt(lit(threshold)))
        .select([col(panel.entity_key()), col(panel.date_key()), col(GAP_DAYS)])
        .collect()?;
    let entities = rows.column(panel.entity_key())?.str()?;
    let dates = column_dates(rows.column(panel.date_key())?)?;
    let spans = rows.column(GAP_DAYS)?.i32()?;

    let mut gaps = Vec::with_capacity(rows.height());
    for ((entity, to), span) in entities.into_iter().zip(dates).zip(spans.into_iter()) {
        if let (Some(entity), Some(to), Some(span)) = (entity, to, span) {
            gaps.push(CalendarGap {
                entity: entity.to_string(),
                from: to - Duration::days(i64::from(span)),
                to,
            });
        }
    }
    Ok(gaps)
}

/// Turn percentage literals into fractions and cast text columns to numbers
/// where every cell allows it. Returns the panel, the converted column names
/// and the names left as text. Columns left as text still carry their
/// percentage cells as fractions.
pub fn normalize_percentages(
    mut panel: Panel,
) -> Result<(Panel, Vec<String>, Vec<String>), PipelineError> {
    let mut normalized = Vec::new();
    let mut text = Vec::new();
    for name in panel.column_names() {
        let column = panel.frame().column(&name)?;
        if column.dtype() != &DataType::String {
            continue;
        }
        let cast = cast_text_column(column.str()?.into_iter());
        if cast.is_numeric() {
            normalized.push(name.clone());
        } else {
            text.push(name.clone());
        }
        panel.set_column(cast.into_column(&name))?;
    }
    Ok((panel, normalized, text))
}
