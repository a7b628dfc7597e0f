//! Source loading: CSV files, directories of CSV files and JSON tables.
//!
//! Files are read with the polars readers, inferring each column's type over
//! the whole file:
//! - the configured date column becomes `Date` (ISO dates, optionally with
//!   a time part that is discarded);
//! - integer columns are widened to `Float64`;
//! - anything non-numeric stays text. Percentage literals are left to the
//!   cleaner.
//!
//! A directory is read as one table: every `*.csv` inside it, in file-name
//! order, stacked by column name. Columns missing from a file are null for
//! its rows.

use chrono::{NaiveDate, NaiveDateTime};
use equipanel_core::domain::SourceTable;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from the source loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed table in '{path}': {source}")]
    Read { path: PathBuf, source: PolarsError },

    #[error("malformed JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("'{path}': unsupported JSON layout ({reason})")]
    JsonLayout { path: PathBuf, reason: String },

    #[error("'{path}': column '{column}' has unparseable date '{value}'")]
    DateParse {
        path: PathBuf,
        column: String,
        value: String,
    },

    #[error("'{path}': date column '{column}' not found")]
    MissingDateColumn { path: PathBuf, column: String },

    #[error("directory '{0}' contains no CSV files")]
    EmptyDirectory(PathBuf),

    #[error("'{0}': unsupported file type (expected .csv, .json or a directory)")]
    UnsupportedExtension(PathBuf),
}

fn read_err(path: &Path) -> impl FnOnce(PolarsError) -> LoadError + '_ {
    move |source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    }
}

/// Load one source table from a file or directory.
///
/// `date_column` names the column parsed as dates, if any.
pub fn load_table(name: &str, path: &Path, date_column: Option<&str>) -> Result<SourceTable, LoadError> {
    let frame = if path.is_dir() {
        read_csv_dir(path)?
    } else {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => read_csv(path)?,
            Some(ext) if ext.eq_ignore_ascii_case("json") => read_json(path)?,
            _ => return Err(LoadError::UnsupportedExtension(path.to_path_buf())),
        }
    };
    debug!(source = name, rows = frame.height(), columns = frame.width(), path = %path.display(), "source read");
    let frame = type_frame(path, frame, date_column)?;
    Ok(SourceTable::new(name, frame))
}

fn read_csv(path: &Path) -> Result<DataFrame, LoadError> {
    let mut frame = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(read_err(path))?;
    let trimmed: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|n| n.trim().to_string())
        .collect();
    frame.set_column_names(trimmed).map_err(read_err(path))?;
    widen_integers(frame).map_err(read_err(path))
}

/// Cast every integer column to `Float64`.
fn widen_integers(frame: DataFrame) -> PolarsResult<DataFrame> {
    let casts: Vec<Expr> = frame
        .get_columns()
        .iter()
        .filter(|c| c.dtype().is_integer())
        .map(|c| col(c.name().as_str()).cast(DataType::Float64))
        .collect();
    if casts.is_empty() {
        return Ok(frame);
    }
    frame.lazy().with_columns(casts).collect()
}

fn read_csv_dir(dir: &Path) -> Result<DataFrame, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")))
        .collect();
    if files.is_empty() {
        return Err(LoadError::EmptyDirectory(dir.to_path_buf()));
    }
    files.sort();

    let frames = files.iter().map(|f| read_csv(f)).collect::<Result<Vec<_>, _>>()?;
    let frame = stack_by_name(frames).map_err(read_err(dir))?;
    debug!(dir = %dir.display(), files = files.len(), rows = frame.height(), "csv directory read");
    Ok(frame)
}

/// Stack frames whose columns may differ in order or presence. Columns keep
/// the order they are first seen in; a name typed differently by two files
/// falls back to text. All-null columns do not vote on the type.
fn stack_by_name(frames: Vec<DataFrame>) -> PolarsResult<DataFrame> {
    let mut layout: Vec<(String, DataType)> = Vec::new();
    for frame in &frames {
        for column in frame.get_columns() {
            let dtype = if column.null_count() == column.len() {
                DataType::Null
            } else {
                column.dtype().clone()
            };
            match layout.iter_mut().find(|(name, _)| name == column.name().as_str()) {
                None => layout.push((column.name().to_string(), dtype)),
                Some((_, seen)) if dtype == DataType::Null || *seen == dtype => {}
                Some((_, seen)) if *seen == DataType::Null => *seen = dtype,
                Some((_, seen)) => *seen = DataType::String,
            }
        }
    }
    for (_, dtype) in &mut layout {
        if *dtype == DataType::Null {
            *dtype = DataType::String;
        }
    }

    let aligned: Vec<LazyFrame> = frames
        .into_iter()
        .map(|frame| {
            let select: Vec<Expr> = layout
                .iter()
                .map(|(name, dtype)| {
                    if frame.column(name).is_ok() {
                        col(name.as_str()).cast(dtype.clone())
                    } else {
                        lit(NULL).cast(dtype.clone()).alias(name.as_str())
                    }
                })
                .collect();
            frame.lazy().select(select)
        })
        .collect();
    concat(aligned, UnionArgs::default())?.collect()
}

fn read_json(path: &Path) -> Result<DataFrame, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let layout_err = |reason: &str| LoadError::JsonLayout {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let records: Vec<Value> = match value {
        // records: [{"col": value, ...}, ...]
        Value::Array(records) => records
            .into_iter()
            .map(|record| match record {
                Value::Object(fields) => Ok(clean_record(fields)),
                _ => Err(layout_err("array elements must be objects")),
            })
            .collect::<Result<_, _>>()?,
        // columns: {"col": {"0": value, "1": value, ...}, ...}
        Value::Object(columns) => {
            let mut index: Vec<String> = Vec::new();
            for cells in columns.values() {
                let Value::Object(cells) = cells else {
                    return Err(layout_err("column values must be objects keyed by row"));
                };
                for key in cells.keys() {
                    if !index.contains(key) {
                        index.push(key.clone());
                    }
                }
            }
            // pandas writes a numeric index; keep it in numeric order
            index.sort_by_key(|k| (k.parse::<u64>().unwrap_or(u64::MAX), k.clone()));

            index
                .iter()
                .map(|row| {
                    let fields: Map<String, Value> = columns
                        .iter()
                        .filter_map(|(name, cells)| Some((name.clone(), cells.get(row)?.clone())))
                        .collect();
                    clean_record(fields)
                })
                .collect()
        }
        _ => return Err(layout_err("expected an array of records or an object of columns")),
    };
    if records.is_empty() {
        return Err(layout_err("no rows"));
    }

    let bytes = serde_json::to_vec(&records).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let frame = JsonReader::new(Cursor::new(bytes))
        .with_json_format(JsonFormat::Json)
        .finish()
        .map_err(read_err(path))?;
    widen_integers(frame).map_err(read_err(path))
}

/// Trim text cells and turn blank ones into nulls.
fn clean_record(fields: Map<String, Value>) -> Value {
    let fields = fields
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) if s.trim().is_empty() => Value::Null,
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other,
            };
            (name.trim().to_string(), value)
        })
        .collect();
    Value::Object(fields)
}

/// Parse `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok().map(|dt| dt.date()))
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
}

/// Turn the configured date column into a `Date` column.
fn type_frame(path: &Path, mut frame: DataFrame, date_column: Option<&str>) -> Result<DataFrame, LoadError> {
    let Some(name) = date_column else {
        return Ok(frame);
    };
    let column = frame.column(name).map_err(|_| LoadError::MissingDateColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    })?;

    let dates = match column.dtype() {
        DataType::Date => None,
        DataType::Datetime(..) => Some(column.cast(&DataType::Date).map_err(read_err(path))?),
        _ => {
            let text = column.cast(&DataType::String).map_err(read_err(path))?;
            let parsed = text
                .str()
                .map_err(read_err(path))?
                .into_iter()
                .map(|cell| match cell {
                    None => Ok(None),
                    Some(s) => parse_date(s).map(Some).ok_or_else(|| LoadError::DateParse {
                        path: path.to_path_buf(),
                        column: name.to_string(),
                        value: s.to_string(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some(equipanel_core::domain::column::date_column(name, &parsed).map_err(read_err(path))?)
        }
    };
    if let Some(dates) = dates {
        frame.with_column(dates).map_err(read_err(path))?;
    }
    Ok(frame)
}
