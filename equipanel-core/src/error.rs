use crate::config::ConfigError;
use crate::domain::PanelError;
use crate::schema::SchemaError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Fatal pipeline errors. Any of these aborts the run before output exists.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("duplicate key {key} in source '{source_name}'")]
    DuplicateKey { source_name: String, key: String },

    #[error("source '{source_name}' is missing join key column '{column}'")]
    MissingJoinKey { source_name: String, column: String },

    #[error("source '{source_name}' is empty")]
    EmptySource { source_name: String },

    #[error("column '{column}' from source '{source_name}' collides with an existing column")]
    ColumnCollision { source_name: String, column: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}
