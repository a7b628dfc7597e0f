//! TOML run configuration: where each source lives and where the panel goes.
//!
//! ```toml
//! output = "out/panel.parquet"
//! prices = "data/wse_prices"            # a CSV file or a directory of CSVs
//! metadata = "data/wse_info/wse_info.json"
//!
//! [[disclosures]]
//! name = "balance_sheets"
//! path = "data/wse_info/balance_sheets.csv"
//! date_column = "Data publikacji"
//!
//! [pipeline.features]
//! parallel = false
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use equipanel_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::export::OutputFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Pipeline(#[from] equipanel_core::ConfigError),
}

/// One disclosure table and the name of its publication-date column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureFile {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

fn default_date_column() -> String {
    "date".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Panel destination; the extension picks CSV or Parquet.
    pub output: PathBuf,
    pub prices: PathBuf,
    pub metadata: PathBuf,
    #[serde(default)]
    pub disclosures: Vec<DisclosureFile>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file, resolving relative paths
    /// against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output);
        resolve(&mut self.prices);
        resolve(&mut self.metadata);
        for d in &mut self.disclosures {
            resolve(&mut d.path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        OutputFormat::from_path(&self.output).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "output '{}' must end in .csv or .parquet",
                self.output.display()
            ))
        })?;

        let mut names = HashSet::new();
        for d in &self.disclosures {
            if d.name.trim().is_empty() {
                return Err(ConfigError::Invalid("disclosure name must not be empty".into()));
            }
            if !names.insert(d.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "disclosure '{}' is listed twice",
                    d.name
                )));
            }
        }
        self.pipeline.validate()?;
        Ok(())
    }

    /// BLAKE3 hash of the serialized configuration. Equal configs hash equal.
    pub fn config_hash(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
