//! Raw source tables handed over by the acquisition layer.
//!
//! Each table is already headered and deduplicated column-wise. Rows are
//! keyed by an entity identifier and an effective date, except entity
//! metadata which is keyed by the security identifier alone.

use super::column::DataKind;
use polars::prelude::*;

/// A named source table backed by a polars frame.
#[derive(Debug, Clone)]
pub struct SourceTable {
    name: String,
    frame: DataFrame,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
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

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0 || self.frame.width() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn kind_of(&self, name: &str) -> Option<DataKind> {
        self.frame
            .column(name)
            .ok()
            .and_then(|c| DataKind::of(c.dtype()))
    }

    /// Rename a column in place. Returns `false` when `from` does not exist
    /// or `to` is already taken.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if self.has_column(to) {
            return false;
        }
        self.frame.rename(from, to.into()).is_ok()
    }
}

impl PartialEq for SourceTable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.frame.equals_missing(&other.frame)
    }
}

/// A low-frequency source (financial statement or indicator snapshot) and the
/// name of the column holding its publication date.
#[derive(Debug, Clone, PartialEq)]
pub struct DisclosureSource {
    pub table: SourceTable,
    pub date_column: String,
}

impl DisclosureSource {
    pub fn new(table: SourceTable, date_column: impl Into<String>) -> Self {
        Self {
            table,
            date_column: date_column.into(),
        }
    }
}

/// Every raw input of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTables {
    pub prices: SourceTable,
    pub metadata: SourceTable,
    pub disclosures: Vec<DisclosureSource>,
}
