//! Panel Joiner.
//!
//! Merges the price table, entity metadata and every disclosure source into
//! one daily panel keyed by (entity, date):
//!
//! 1. Each price row resolves its security identifier to a ticker through a
//!    left join with the metadata table. Securities without metadata are
//!    excluded (a known selection bias, reported but not corrected).
//! 2. Every resolved entity gets one row per calendar day between the first
//!    and last price date. Prices and disclosures are left-joined onto that
//!    scaffold on (ticker, date); disclosure dates outside it are ignored.
//! 3. Every column is forward-filled per entity across the calendar, so a
//!    disclosure published on a non-trading day still reaches the next
//!    trading row. Values never flow backwards.
//! 4. Calendar rows without a close price are dropped.
//!
//! Any duplicated key is fatal.

use crate::config::{PipelineConfig, PriceColumns};
use crate::domain::column::{column_dates, date_column};
use crate::domain::{DataKind, Panel, PanelError, SourceTable, SourceTables};
use crate::error::PipelineError;
use crate::schema::{SchemaError, Stage};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

const ENTITY_KEY: &str = "__entity";
const DATE_KEY: &str = "__date";
const SECURITY_KEY: &str = "__security";
const TRADING: &str = "__trading";
const ROWS: &str = "__rows";

/// Counters describing one join.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    /// Days between the first and last observed price date, inclusive.
    pub calendar_days: usize,
    pub entities: usize,
    /// Security identifiers with prices but no metadata row.
    pub unresolved_securities: Vec<String>,
    /// Entity calendar days removed for lacking a close price.
    pub non_trading_rows: usize,
    /// Disclosure rows for unknown tickers, missing keys or out-of-calendar dates.
    pub ignored_disclosure_rows: usize,
    /// Columns renamed with `_x` / `_y` because two sources shared a name.
    pub suffixed_columns: Vec<String>,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Price,
    Metadata,
    Disclosure(usize),
}

struct OutputColumn {
    name: String,
    origin: Origin,
    source: String,
}

/// Output column names, built the way successive left merges would build
/// them.
#[derive(Default)]
struct Layout {
    columns: Vec<OutputColumn>,
    suffixed: Vec<String>,
}

impl Layout {
    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Append `table`'s columns, except `keys`. A name already present is
    /// split into `<name>_x` (existing) and `<name>_y` (incoming).
    fn merge(
        &mut self,
        origin: Origin,
        table: &SourceTable,
        keys: &[&str],
        reserved: &[&str],
    ) -> Result<(), PipelineError> {
        let collision = |column: &str| PipelineError::ColumnCollision {
            source_name: table.name().to_string(),
            column: column.to_string(),
        };
        for source in table.column_names() {
            if keys.contains(&source.as_str()) {
                continue;
            }
            if reserved.contains(&source.as_str()) || source.starts_with("__") {
                return Err(collision(&source));
            }
            let mut name = source.clone();
            if let Some(pos) = self.position(&name) {
                let left = format!("{name}_x");
                let right = format!("{name}_y");
                let taken = |n: &str| self.position(n).is_some() || table.has_column(n);
                if taken(&left) || taken(&right) {
                    return Err(collision(&name));
                }
                self.columns[pos].name = left.clone();
                self.suffixed.push(left);
                self.suffixed.push(right.clone());
                name = right;
            }
            self.columns.push(OutputColumn {
                name,
                origin,
                source,
            });
        }
        Ok(())
    }

    /// Select expressions renaming one source's columns to their output names.
    fn projection(&self, origin: Origin) -> Vec<Expr> {
        self.columns
            .iter()
            .filter(|c| c.origin == origin)
            .map(|c| col(c.source.as_str()).alias(c.name.as_str()))
            .collect()
    }

    fn output_name(&self, origin: Origin, source: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.origin == origin && c.source == source)
            .map(|c| c.name.as_str())
    }
}

/// Join all sources into a daily (entity, date) panel.
pub fn join_sources(
    sources: &SourceTables,
    config: &PipelineConfig,
) -> Result<(Panel, JoinReport), PipelineError> {
    let cols = &config.columns;
    let prices = &sources.prices;
    let metadata = &sources.metadata;

    require_rows(prices)?;
    require_rows(metadata)?;
    require_kind(prices, &cols.security, DataKind::Text)?;
    require_kind(prices, &cols.date, DataKind::Date)?;
    require_close(prices, cols)?;
    require_kind(metadata, &cols.security, DataKind::Text)?;
    require_kind(metadata, &cols.entity, DataKind::Text)?;

    let disclosures = sources
        .disclosures
        .iter()
        .map(|d| rekey_disclosure(&d.table, &d.date_column, cols))
        .collect::<Result<Vec<_>, _>>()?;

    let (first, last) = price_calendar(prices, &cols.date)?;
    let calendar_days = (last - first).num_days() as usize + 1;

    if let Some(key) = first_duplicate(metadata.lazy(), &[cols.security.as_str()])? {
        return Err(duplicate(metadata, key));
    }
    if let Some(key) = first_duplicate(prices.lazy(), &[cols.security.as_str(), cols.date.as_str()])? {
        return Err(duplicate(prices, key));
    }

    let reserved = [cols.entity.as_str(), cols.date.as_str()];
    let mut layout = Layout::default();
    layout.merge(Origin::Price, prices, &[cols.entity.as_str(), cols.date.as_str()], &reserved)?;
    layout.merge(Origin::Metadata, metadata, &[cols.security.as_str(), cols.entity.as_str()], &reserved)?;
    for (k, table) in disclosures.iter().enumerate() {
        layout.merge(Origin::Disclosure(k), table, &[cols.entity.as_str(), cols.date.as_str()], &reserved)?;
    }
    let close = layout
        .output_name(Origin::Price, &cols.close)
        .unwrap_or(cols.close.as_str())
        .to_string();

    // security -> ticker, carrying the metadata columns onto price rows
    let mut meta_select = vec![
        col(cols.security.as_str()).alias(SECURITY_KEY),
        col(cols.entity.as_str()).alias(ENTITY_KEY),
    ];
    meta_select.extend(layout.projection(Origin::Metadata));
    let meta = metadata
        .lazy()
        .filter(col(cols.security.as_str()).is_not_null())
        .select(meta_select);

    let mut price_select = vec![
        col(cols.security.as_str()).alias(SECURITY_KEY),
        col(cols.date.as_str()).alias(DATE_KEY),
    ];
    price_select.extend(layout.projection(Origin::Price));
    let resolved = prices
        .lazy()
        .filter(
            col(cols.security.as_str())
                .is_not_null()
                .and(col(cols.date.as_str()).is_not_null()),
        )
        .select(price_select)
        .join(
            meta,
            [col(SECURITY_KEY)],
            [col(SECURITY_KEY)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    let unresolved = unresolved_securities(&resolved)?;
    if !unresolved.is_empty() {
        warn!(
            count = unresolved.len(),
            securities = ?unresolved,
            "securities without metadata excluded from the panel"
        );
    }
    let resolved = resolved
        .lazy()
        .filter(col(ENTITY_KEY).is_not_null())
        .drop([SECURITY_KEY])
        .with_column(col(close.as_str()).is_not_null().alias(TRADING))
        .collect()?;

    // two securities resolving to the same ticker on one day
    if let Some(key) = first_duplicate(resolved.clone().lazy(), &[ENTITY_KEY, DATE_KEY])? {
        return Err(duplicate(prices, key));
    }

    let entities = unique_entities(&resolved)?;
    let scaffold = calendar_scaffold(&entities, first, calendar_days)?;

    let mut joined = scaffold.clone().lazy().join(
        resolved.lazy(),
        [col(ENTITY_KEY), col(DATE_KEY)],
        [col(ENTITY_KEY), col(DATE_KEY)],
        JoinArgs::new(JoinType::Left),
    );

    let mut ignored_disclosure_rows = 0;
    for (k, table) in disclosures.iter().enumerate() {
        let mut select = vec![
            col(cols.entity.as_str()).alias(ENTITY_KEY),
            col(cols.date.as_str()).alias(DATE_KEY),
        ];
        select.extend(layout.projection(Origin::Disclosure(k)));
        let rows = table
            .lazy()
            .filter(
                col(cols.entity.as_str())
                    .is_not_null()
                    .and(col(cols.date.as_str()).is_not_null()),
            )
            .select(select);

        if let Some(key) = first_duplicate(rows.clone(), &[ENTITY_KEY, DATE_KEY])? {
            return Err(duplicate(table, key));
        }
        let matched = rows
            .clone()
            .join(
                scaffold.clone().lazy(),
                [col(ENTITY_KEY), col(DATE_KEY)],
                [col(ENTITY_KEY), col(DATE_KEY)],
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?
            .height();
        let ignored = table.height() - matched;
        debug!(source = table.name(), rows = table.height(), ignored, "disclosure source indexed");
        ignored_disclosure_rows += ignored;

        joined = joined.join(
            rows,
            [col(ENTITY_KEY), col(DATE_KEY)],
            [col(ENTITY_KEY), col(DATE_KEY)],
            JoinArgs::new(JoinType::Left),
        );
    }

    // Fill first, drop non-trading rows second: a disclosure published on a
    // weekend or holiday lands on a calendar row without a close and must
    // survive into the next trading row.
    let panel = assemble(joined, &layout, cols)?;
    if let Some((entity, date)) = panel.first_duplicate_key()? {
        return Err(PipelineError::DuplicateKey {
            source_name: "joined panel".to_string(),
            key: format!("({entity}, {date})"),
        });
    }

    let report = JoinReport {
        calendar_days,
        entities: panel.groups()?.len(),
        unresolved_securities: unresolved,
        non_trading_rows: entities.len() * calendar_days - panel.height(),
        ignored_disclosure_rows,
        suffixed_columns: layout.suffixed,
        rows: panel.height(),
        columns: panel.width(),
    };
    info!(
        rows = report.rows,
        columns = report.columns,
        entities = report.entities,
        calendar_days,
        "sources joined"
    );
    Ok((panel, report))
}

/// Sort the scaffold, forward-fill every column per entity, then keep the
/// trading rows and restore the configured key names.
fn assemble(joined: LazyFrame, layout: &Layout, cols: &PriceColumns) -> Result<Panel, PipelineError> {
    let filled: Vec<Expr> = layout
        .columns
        .iter()
        .map(|c| {
            col(c.name.as_str())
                .forward_fill(None)
                .over([col(ENTITY_KEY)])
        })
        .collect();

    let mut output = vec![
        col(ENTITY_KEY).alias(cols.entity.as_str()),
        col(DATE_KEY).alias(cols.date.as_str()),
    ];
    output.extend(layout.columns.iter().map(|c| col(c.name.as_str())));

    let frame = joined
        .sort([ENTITY_KEY, DATE_KEY], Default::default())
        .with_columns(filled)
        .filter(col(TRADING).fill_null(lit(false)))
        .select(output)
        .collect()?;
    Ok(Panel::new(frame, &cols.entity, &cols.date)?)
}

/// One row per (entity, calendar day), entities ascending.
fn calendar_scaffold(entities: &[String], first: NaiveDate, days: usize) -> PolarsResult<DataFrame> {
    let mut keys = Vec::with_capacity(entities.len() * days);
    let mut dates = Vec::with_capacity(entities.len() * days);
    for entity in entities {
        for day in first.iter_days().take(days) {
            keys.push(entity.clone());
            dates.push(Some(day));
        }
    }
    DataFrame::new(vec![
        Column::new(ENTITY_KEY.into(), keys),
        date_column(DATE_KEY, &dates)?,
    ])
}

fn price_calendar(prices: &SourceTable, date: &str) -> Result<(NaiveDate, NaiveDate), PipelineError> {
    let bounds = prices
        .lazy()
        .select([col(date).min().alias("first"), col(date).max().alias("last")])
        .collect()?;
    let first = column_dates(bounds.column("first")?)?.into_iter().flatten().next();
    let last = column_dates(bounds.column("last")?)?.into_iter().flatten().next();
    first.zip(last).ok_or_else(|| PipelineError::EmptySource {
        source_name: prices.name().to_string(),
    })
}

fn unresolved_securities(resolved: &DataFrame) -> PolarsResult<Vec<String>> {
    let missing = resolved
        .clone()
        .lazy()
        .filter(col(ENTITY_KEY).is_null())
        .select([col(SECURITY_KEY)])
        .unique(None, UniqueKeepStrategy::Any)
        .sort([SECURITY_KEY], Default::default())
        .collect()?;
    Ok(missing
        .column(SECURITY_KEY)?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

fn unique_entities(resolved: &DataFrame) -> PolarsResult<Vec<String>> {
    let entities = resolved
        .clone()
        .lazy()
        .select([col(ENTITY_KEY)])
        .unique(None, UniqueKeepStrategy::Any)
        .sort([ENTITY_KEY], Default::default())
        .collect()?;
    Ok(entities
        .column(ENTITY_KEY)?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

/// Smallest key that occurs on more than one non-null row, rendered as
/// `value` or `(a, b)`.
fn first_duplicate(frame: LazyFrame, keys: &[&str]) -> PolarsResult<Option<String>> {
    let present = keys
        .iter()
        .map(|k| col(*k).is_not_null())
        .reduce(|a, b| a.and(b))
        .unwrap_or_else(|| lit(true));
    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let dups = frame
        .filter(present)
        .group_by(key_exprs)
        .agg([len().alias(ROWS)])
        .filter(col(ROWS).gt(lit(1)))
        .sort(keys.to_vec(), Default::default())
        .limit(1)
        .collect()?;
    if dups.height() == 0 {
        return Ok(None);
    }

    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let rendered = dups.column(key)?.cast(&DataType::String)?;
        parts.push(rendered.str()?.get(0).unwrap_or_default().to_string());
    }
    Ok(Some(match parts.as_slice() {
        [single] => single.clone(),
        _ => format!("({})", parts.join(", ")),
    }))
}

/// Clone a disclosure table with its publication-date column renamed to the
/// common date key, checking its join keys.
fn rekey_disclosure(
    table: &SourceTable,
    date_column: &str,
    cols: &PriceColumns,
) -> Result<SourceTable, PipelineError> {
    require_rows(table)?;
    let mut table = table.clone();
    if date_column != cols.date {
        if table.has_column(&cols.date) {
            return Err(PipelineError::ColumnCollision {
                source_name: table.name().to_string(),
                column: cols.date.clone(),
            });
        }
        if !table.rename_column(date_column, &cols.date) {
            return Err(PipelineError::MissingJoinKey {
                source_name: table.name().to_string(),
                column: date_column.to_string(),
            });
        }
    }
    require_kind(&table, &cols.entity, DataKind::Text)?;
    require_kind(&table, &cols.date, DataKind::Date)?;
    Ok(table)
}

fn duplicate(table: &SourceTable, key: String) -> PipelineError {
    PipelineError::DuplicateKey {
        source_name: table.name().to_string(),
        key,
    }
}

fn require_rows(table: &SourceTable) -> Result<(), PipelineError> {
    if table.is_empty() {
        return Err(PipelineError::EmptySource {
            source_name: table.name().to_string(),
        });
    }
    Ok(())
}

fn require_kind(table: &SourceTable, column: &str, expected: DataKind) -> Result<(), PipelineError> {
    let dtype = table
        .frame()
        .column(column)
        .map_err(|_| PipelineError::MissingJoinKey {
            source_name: table.name().to_string(),
            column: column.to_string(),
        })?
        .dtype();
    if DataKind::of(dtype) != Some(expected) {
        return Err(PanelError::WrongKind {
            column: column.to_string(),
            expected,
            actual: dtype.to_string(),
        }
        .into());
    }
    Ok(())
}

fn require_close(prices: &SourceTable, cols: &PriceColumns) -> Result<(), PipelineError> {
    match prices.frame().column(&cols.close) {
        Ok(close) if DataKind::of(close.dtype()) == Some(DataKind::Number) => Ok(()),
        Ok(close) => Err(SchemaError::TypeMismatch {
            stage: Stage::Joined,
            column: cols.close.clone(),
            expected: DataType::Float64,
            actual: close.dtype().clone(),
        }
        .into()),
        Err(_) => Err(SchemaError::MissingColumn {
            stage: Stage::Joined,
            column: cols.close.clone(),
        }
        .into()),
    }
}
