//! Equipanel Core: builds a model-ready daily equity panel.
//!
//! - Typed columnar domain (source tables, the (entity, date) panel)
//! - Panel Joiner: calendar, merges, causal forward-fill
//! - Panel Cleaner: sparse/superfluous columns, change repair, percentage text
//! - Feature Engine: liquidity, returns, lags, target, momentum, alphas, calendar
//! - Stage schemas validated at every boundary

pub mod clean;
pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod indicators;
pub mod join;
pub mod percent;
pub mod pipeline;
pub mod schema;
pub mod synthetic;

pub use config::{CleanConfig, ConfigError, FeatureConfig, PipelineConfig, PriceColumns};
pub use domain::{DataKind, DisclosureSource, Panel, SourceTable, SourceTables};
pub use error::PipelineError;
pub use pipeline::{build_panel, PipelineReport};
