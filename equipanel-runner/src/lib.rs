//! Equipanel Runner: the file-system layer around `equipanel-core`.
//!
//! - TOML run configuration naming every source file
//! - CSV / JSON source loading with per-column typing
//! - CSV and Parquet panel export, staged and committed with the run's other outputs
//! - BLAKE3 run manifest and feature-column list
//! - Synthetic demo workspace

pub mod config;
pub mod export;
pub mod loader;
pub mod manifest;
pub mod runner;

pub use config::{ConfigError, DisclosureFile, RunConfig};
pub use export::{commit_all, stage, write_panel, ExportError, OutputFormat, StagedFile};
pub use loader::{load_table, LoadError};
pub use manifest::{InputDigest, RunManifest, SCHEMA_VERSION};
pub use runner::{load_sources, run_pipeline, write_demo_sources, RunOutcome};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
        assert_send::<ExportError>();
        assert_sync::<ExportError>();
    }

    #[test]
    fn outcome_is_send_sync() {
        assert_send::<RunOutcome>();
        assert_sync::<RunOutcome>();
    }
}
