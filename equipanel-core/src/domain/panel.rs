//! The long-format panel: one row per (entity, date).
//!
//! A `Panel` wraps a polars `DataFrame` whose first two columns are the
//! entity key (`String`) and the date key (`Date`). Rows are kept sorted by
//! entity then date. Stages take a `Panel` by value and hand back a new one,
//! so no stage observes another's intermediate state.

use super::column::{column_dates, column_numbers, DataKind};
use chrono::NaiveDate;
use polars::prelude::*;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{column}' is {actual}, expected {expected}")]
    WrongKind {
        column: String,
        expected: DataKind,
        actual: String,
    },

    #[error("key column '{0}' contains nulls")]
    NullKey(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

#[derive(Debug, Clone)]
pub struct Panel {
    frame: DataFrame,
    entity: String,
    date: String,
}

impl Panel {
    /// Wrap a frame holding both key columns. The keys are moved to the
    /// front and the rows are sorted by (entity, date), keeping the input
    /// order of ties.
    pub fn new(frame: DataFrame, entity: &str, date: &str) -> Result<Self, PanelError> {
        check_key(&frame, entity, DataKind::Text)?;
        check_key(&frame, date, DataKind::Date)?;

        let mut order = vec![entity.to_string(), date.to_string()];
        order.extend(
            frame
                .get_column_names()
                .into_iter()
                .map(|n| n.to_string())
                .filter(|n| n != entity && n != date),
        );
        let frame = frame
            .select(order)?
            .lazy()
            .sort(
                [entity, date],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;

        Ok(Self {
            frame,
            entity: entity.to_string(),
            date: date.to_string(),
        })
    }

    pub fn entity_key(&self) -> &str {
        &self.entity
    }

    pub fn date_key(&self) -> &str {
        &self.date
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    /// Replace the frame, re-checking keys and order. Used after a lazy
    /// stage has been collected.
    pub fn with_frame(&self, frame: DataFrame) -> Result<Self, PanelError> {
        Panel::new(frame, &self.entity, &self.date)
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Number of non-key columns.
    pub fn width(&self) -> usize {
        self.frame.width().saturating_sub(2)
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Non-key column names in frame order.
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .filter(|n| *n != self.entity && *n != self.date)
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        name != self.entity && name != self.date && self.frame.column(name).is_ok()
    }

    pub fn kind_of(&self, name: &str) -> Option<DataKind> {
        self.frame
            .column(name)
            .ok()
            .and_then(|c| DataKind::of(c.dtype()))
    }

    pub fn dtype_of(&self, name: &str) -> Option<DataType> {
        self.frame.column(name).ok().map(|c| c.dtype().clone())
    }

    pub fn entities(&self) -> Result<Vec<String>, PanelError> {
        Ok(self
            .frame
            .column(&self.entity)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    }

    pub fn dates(&self) -> Result<Vec<NaiveDate>, PanelError> {
        Ok(column_dates(self.frame.column(&self.date)?)?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Fail unless `name` exists and holds `kind`.
    pub fn require_kind(&self, name: &str, kind: DataKind) -> Result<(), PanelError> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| PanelError::UnknownColumn(name.to_string()))?;
        if DataKind::of(column.dtype()) != Some(kind) {
            return Err(PanelError::WrongKind {
                column: name.to_string(),
                expected: kind,
                actual: column.dtype().to_string(),
            });
        }
        Ok(())
    }

    /// Numeric view of a column with nulls as `NaN`.
    pub fn numbers(&self, name: &str) -> Result<Vec<f64>, PanelError> {
        self.require_kind(name, DataKind::Number)?;
        Ok(column_numbers(self.frame.column(name)?)?)
    }

    /// Append a new column. Fails if the name is taken.
    pub fn push_column(&mut self, column: Column) -> Result<(), PanelError> {
        if self.frame.column(column.name().as_str()).is_ok() {
            return Err(PanelError::DuplicateColumn(column.name().to_string()));
        }
        self.frame.with_column(column)?;
        Ok(())
    }

    /// Insert or replace a data column, keeping its position when replacing.
    pub fn set_column(&mut self, column: Column) -> Result<(), PanelError> {
        let name = column.name().to_string();
        if name == self.entity || name == self.date {
            return Err(PanelError::DuplicateColumn(name));
        }
        self.frame.with_column(column)?;
        Ok(())
    }

    /// Evaluate row-preserving expressions, adding or replacing columns.
    pub fn with_columns(&mut self, exprs: Vec<Expr>) -> Result<(), PanelError> {
        let frame = std::mem::take(&mut self.frame);
        self.frame = frame.lazy().with_columns(exprs).collect()?;
        Ok(())
    }

    /// Keep the rows matching `predicate`; row order is preserved.
    pub fn filter(&self, predicate: Expr) -> Result<Panel, PanelError> {
        Ok(Panel {
            frame: self.lazy().filter(predicate).collect()?,
            entity: self.entity.clone(),
            date: self.date.clone(),
        })
    }

    /// Remove the named data columns that exist. Returns the names actually
    /// removed, in frame order.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Vec<String>, PanelError> {
        let doomed: Vec<String> = self
            .column_names()
            .into_iter()
            .filter(|c| names.iter().any(|n| n.as_ref() == c))
            .collect();
        for name in &doomed {
            self.frame.drop_in_place(name)?;
        }
        Ok(doomed)
    }

    /// Split the sorted panel into contiguous per-entity row ranges.
    pub fn groups(&self) -> Result<EntityGroups, PanelError> {
        let entities = self.entities()?;
        let mut groups = Vec::new();
        let mut start = 0;
        for i in 1..=entities.len() {
            if i == entities.len() || entities[i] != entities[start] {
                groups.push(EntityGroup {
                    entity: entities[start].clone(),
                    rows: start..i,
                });
                start = i;
            }
        }
        Ok(EntityGroups { groups })
    }

    /// First (entity, date) pair that occurs more than once, if any.
    pub fn first_duplicate_key(&self) -> Result<Option<(String, NaiveDate)>, PanelError> {
        let entities = self.entities()?;
        let dates = self.dates()?;
        Ok((1..entities.len())
            .find(|&i| entities[i] == entities[i - 1] && dates[i] == dates[i - 1])
            .map(|i| (entities[i].clone(), dates[i])))
    }
}

impl PartialEq for Panel {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.date == other.date && self.frame.equals_missing(&other.frame)
    }
}

fn check_key(frame: &DataFrame, name: &str, kind: DataKind) -> Result<(), PanelError> {
    let column = frame
        .column(name)
        .map_err(|_| PanelError::UnknownColumn(name.to_string()))?;
    if DataKind::of(column.dtype()) != Some(kind) {
        return Err(PanelError::WrongKind {
            column: name.to_string(),
            expected: kind,
            actual: column.dtype().to_string(),
        });
    }
    if column.null_count() > 0 {
        return Err(PanelError::NullKey(name.to_string()));
    }
    Ok(())
}

/// One entity's contiguous rows within a sorted panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityGroup {
    pub entity: String,
    pub rows: Range<usize>,
}

/// Explicit per-entity partition of a panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityGroups {
    groups: Vec<EntityGroup>,
}

impl EntityGroups {
    pub fn iter(&self) -> std::slice::Iter<'_, EntityGroup> {
        self.groups.iter()
    }

    pub fn as_slice(&self) -> &[EntityGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
