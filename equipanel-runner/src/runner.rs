//! End-to-end run: load sources, build the panel, write panel, feature list
//! and manifest.
//!
//! Nothing is written until the whole core pipeline has succeeded, and the
//! three artifacts are committed together: a failed write leaves none of them.

use anyhow::{Context, Result};
use equipanel_core::domain::{SourceTable, SourceTables};
use equipanel_core::synthetic::{generate_sources, SyntheticSpec};
use equipanel_core::{build_panel, DisclosureSource, PipelineConfig, PipelineReport};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

use crate::config::{DisclosureFile, RunConfig};
use crate::export::{commit_all, stage_json, stage_panel, write_table_csv, write_table_json};
use crate::loader::{load_table, LoadError};
use crate::manifest::{hash_path, InputDigest, RunManifest, SCHEMA_VERSION};

pub const FEATURE_LIST_FILE: &str = "feature_columns.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Where a run wrote its artifacts, and what the stages reported.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: PathBuf,
    pub feature_list: PathBuf,
    pub manifest: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub report: PipelineReport,
}

/// Load every source named by the config.
pub fn load_sources(config: &RunConfig) -> Result<SourceTables, LoadError> {
    let date = config.pipeline.columns.date.as_str();
    let prices = load_table("prices", &config.prices, Some(date))?;
    let metadata = load_table("metadata", &config.metadata, None)?;
    let disclosures = config
        .disclosures
        .iter()
        .map(|d| {
            let table = load_table(&d.name, &d.path, Some(&d.date_column))?;
            Ok(DisclosureSource::new(table, d.date_column.clone()))
        })
        .collect::<Result<Vec<_>, LoadError>>()?;
    Ok(SourceTables {
        prices,
        metadata,
        disclosures,
    })
}

fn digest_inputs(config: &RunConfig) -> Result<Vec<InputDigest>> {
    let mut named: Vec<(&str, &Path)> = vec![
        ("prices", config.prices.as_path()),
        ("metadata", config.metadata.as_path()),
    ];
    named.extend(config.disclosures.iter().map(|d| (d.name.as_str(), d.path.as_path())));
    named
        .into_iter()
        .map(|(name, path)| {
            let blake3 = hash_path(path).with_context(|| format!("failed to hash '{}'", path.display()))?;
            Ok(InputDigest {
                name: name.to_string(),
                path: path.to_path_buf(),
                blake3,
            })
        })
        .collect()
}

/// Run the pipeline described by `config` and write its artifacts next to
/// the configured output.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutcome> {
    config.validate().context("invalid run config")?;
    let config_hash = config.config_hash().context("failed to hash run config")?;

    let sources = info_span!("load")
        .in_scope(|| load_sources(config))
        .context("failed to load sources")?;
    let inputs = digest_inputs(config)?;
    info!(
        prices = sources.prices.height(),
        metadata = sources.metadata.height(),
        disclosures = sources.disclosures.len(),
        "sources loaded"
    );

    let (panel, report) = build_panel(&sources, &config.pipeline).context("panel build failed")?;

    let dir = config
        .output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let feature_list = dir.join(FEATURE_LIST_FILE);
    let manifest_path = dir.join(MANIFEST_FILE);

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        created_at: chrono::Local::now().naive_local(),
        config_hash,
        inputs,
        output: config.output.clone(),
        rows: panel.height(),
        columns: panel.width(),
        report: report.clone(),
    };

    let staged = vec![
        stage_panel(&panel, &config.output)
            .with_context(|| format!("failed to write '{}'", config.output.display()))?,
        stage_json(&report.features.feature_columns, &feature_list)
            .context("failed to write feature list")?,
        stage_json(&manifest, &manifest_path).context("failed to write manifest")?,
    ];
    commit_all(staged).context("failed to move outputs into place")?;

    info!(
        output = %config.output.display(),
        rows = manifest.rows,
        columns = manifest.columns,
        "panel written"
    );
    Ok(RunOutcome {
        output: config.output.clone(),
        feature_list,
        manifest: manifest_path,
        rows: manifest.rows,
        columns: manifest.columns,
        report,
    })
}

// ── Demo workspace ───────────────────────────────────────────────────

const MONTH_KEY: &str = "__month";

/// Split a table into one frame per `YYYY-MM` of its date column, in month
/// order.
fn split_by_month(table: &SourceTable, date: &str) -> PolarsResult<Vec<(String, DataFrame)>> {
    let keyed = table
        .lazy()
        .with_column(col(date).dt().strftime("%Y-%m").alias(MONTH_KEY))
        .collect()?;
    let months = keyed
        .clone()
        .lazy()
        .select([col(MONTH_KEY)])
        .unique(None, UniqueKeepStrategy::Any)
        .sort([MONTH_KEY], Default::default())
        .collect()?;
    months
        .column(MONTH_KEY)?
        .str()?
        .into_iter()
        .flatten()
        .map(|month| -> PolarsResult<(String, DataFrame)> {
            let rows = keyed
                .clone()
                .lazy()
                .filter(col(MONTH_KEY).eq(lit(month)))
                .drop([MONTH_KEY])
                .collect()?;
            Ok((month.to_string(), rows))
        })
        .collect()
}

/// Write seeded synthetic sources into `dir` in the on-disk layout the
/// loaders read (prices as one CSV per month, metadata as JSON, one CSV per
/// disclosure table) together with a `run.toml`, and return the loaded
/// config.
pub fn write_demo_sources(
    spec: &SyntheticSpec,
    dir: &Path,
    output_name: &str,
    pipeline: PipelineConfig,
) -> Result<RunConfig> {
    let sources = generate_sources(spec).context("failed to generate synthetic sources")?;
    let date = pipeline.columns.date.as_str();

    let prices_dir = dir.join("prices");
    let months = split_by_month(&sources.prices, date).context("failed to split prices by month")?;
    for (month, rows) in &months {
        let path = prices_dir.join(format!("{month}.csv"));
        write_table_csv(&SourceTable::new("prices", rows.clone()), &path)?;
    }

    write_table_json(&sources.metadata, &dir.join("metadata.json"))?;

    let mut disclosures = Vec::new();
    for d in &sources.disclosures {
        let file = format!("{}.csv", d.table.name());
        write_table_csv(&d.table, &dir.join(&file))?;
        disclosures.push(DisclosureFile {
            name: d.table.name().to_string(),
            path: PathBuf::from(file),
            date_column: d.date_column.clone(),
        });
    }

    let config = RunConfig {
        output: PathBuf::from(output_name),
        prices: PathBuf::from("prices"),
        metadata: PathBuf::from("metadata.json"),
        disclosures,
        pipeline,
    };
    let config_path = dir.join("run.toml");
    std::fs::write(&config_path, config.to_toml_string()?)
        .with_context(|| format!("failed to write '{}'", config_path.display()))?;
    info!(dir = %dir.display(), months = months.len(), "demo sources written");

    Ok(RunConfig::load(&config_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use equipanel_core::domain::column::column_numbers;

    fn small_spec() -> SyntheticSpec {
        SyntheticSpec {
            entities: 3,
            days: 200,
            ..SyntheticSpec::default()
        }
    }

    #[test]
    fn demo_layout_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            write_demo_sources(&small_spec(), dir.path(), "panel.csv", PipelineConfig::default()).unwrap();

        assert!(dir.path().join("run.toml").exists());
        assert!(dir.path().join("prices").join("2023-01.csv").exists());
        assert_eq!(config.prices, dir.path().join("prices"));
        assert_eq!(config.disclosures.len(), 2);
        assert_eq!(config.disclosures[0].date_column, "publication_date");

        let sources = load_sources(&config).unwrap();
        let expected = generate_sources(&small_spec()).unwrap();
        assert_eq!(sources.prices.height(), expected.prices.height());
        assert_eq!(sources.metadata.height(), expected.metadata.height());
        // month files regroup the rows, so compare the sorted values
        let sorted = |t: &SourceTable| {
            let mut v = column_numbers(t.frame().column("close").unwrap()).unwrap();
            v.sort_by(f64::total_cmp);
            v
        };
        assert_eq!(sorted(&sources.prices), sorted(&expected.prices));
    }

    #[test]
    fn months_split_in_order() {
        let sources = generate_sources(&small_spec()).unwrap();
        let months = split_by_month(&sources.prices, "date").unwrap();
        assert_eq!(months[0].0, "2023-01");
        assert_eq!(months.last().unwrap().0, "2023-07");
        let rows: usize = months.iter().map(|(_, f)| f.height()).sum();
        assert_eq!(rows, sources.prices.height());
        assert!(months.iter().all(|(_, f)| f.column(MONTH_KEY).is_err()));
    }

    #[test]
    fn digests_cover_every_input() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            write_demo_sources(&small_spec(), dir.path(), "panel.csv", PipelineConfig::default()).unwrap();
        let digests = digest_inputs(&config).unwrap();
        let names: Vec<&str> = digests.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["prices", "metadata", "balance_sheet", "profitability"]);
        assert!(digests.iter().all(|d| d.blake3.len() == 64));
    }
}
