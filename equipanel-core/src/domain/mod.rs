//! Domain types: raw source tables and the joined panel, both backed by
//! polars frames.

pub mod column;
pub mod panel;
pub mod source;

pub use column::DataKind;
pub use panel::{EntityGroup, EntityGroups, Panel, PanelError};
pub use source::{DisclosureSource, SourceTable, SourceTables};
