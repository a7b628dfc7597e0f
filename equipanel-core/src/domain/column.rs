//! Column kinds and date helpers shared by source tables and the panel.
//!
//! Tables are polars frames. Missing values are nulls in every column kind;
//! the indicator kernels see them as `f64::NAN`.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a column as the pipeline sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Number,
    Text,
    Date,
}

impl DataKind {
    /// Classify a polars dtype. `None` for dtypes the pipeline does not use.
    pub fn of(dtype: &DataType) -> Option<DataKind> {
        match dtype {
            DataType::String => Some(DataKind::Text),
            DataType::Date => Some(DataKind::Date),
            DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Some(DataKind::Number),
            _ => None,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Number => write!(f, "number"),
            DataKind::Text => write!(f, "text"),
            DataKind::Date => write!(f, "date"),
        }
    }
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn epoch_days(date: NaiveDate) -> i32 {
    (date - unix_epoch()).num_days() as i32
}

pub fn from_epoch_days(days: i32) -> NaiveDate {
    unix_epoch() + chrono::Duration::days(i64::from(days))
}

/// A `Date` literal for filters and comparisons.
pub fn date_lit(date: NaiveDate) -> Expr {
    lit(epoch_days(date)).cast(DataType::Date)
}

/// Build a `Date` column from optional calendar dates.
pub fn date_column(name: &str, dates: &[Option<NaiveDate>]) -> PolarsResult<Column> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(epoch_days)).collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}

/// Read a `Date` column back as calendar dates.
pub fn column_dates(column: &Column) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = column.cast(&DataType::Int32)?;
    Ok(days.i32()?.into_iter().map(|d| d.map(from_epoch_days)).collect())
}

/// Read a numeric column as `f64`, nulls becoming `NaN`.
pub fn column_numbers(column: &Column) -> PolarsResult<Vec<f64>> {
    let values = column.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// A `Float64` column where `NaN` marks a missing value.
pub fn number_column(name: &str, values: &[f64]) -> Column {
    let values: Vec<Option<f64>> = values.iter().map(|v| (!v.is_nan()).then_some(*v)).collect();
    Column::new(name.into(), values)
}
