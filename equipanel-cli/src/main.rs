//! Equipanel CLI: build model-ready equity panels.
//!
//! Commands:
//! - `build`: run the pipeline described by a TOML run config
//! - `demo`: write seeded synthetic sources plus a run config, then build them
//! - `check-config`: parse and validate a run config without loading data

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use equipanel_core::synthetic::SyntheticSpec;
use equipanel_core::PipelineConfig;
use equipanel_runner::{run_pipeline, write_demo_sources, RunConfig, RunOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "equipanel", about = "Equipanel CLI: daily equity panel builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join, clean and featurize the sources named in a run config.
    Build {
        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,
    },
    /// Generate synthetic sources into a directory and build a panel from them.
    Demo {
        /// Directory for the sources, run.toml and outputs.
        #[arg(long, default_value = "demo")]
        out_dir: PathBuf,

        /// Number of synthetic entities (one more unresolvable security is added).
        #[arg(long, default_value_t = 5)]
        entities: usize,

        /// Calendar days of price history.
        #[arg(long, default_value_t = 365)]
        days: usize,

        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Panel file name inside the output directory (.csv or .parquet).
        #[arg(long, default_value = "panel.parquet")]
        output: String,
    },
    /// Parse and validate a run config, then print it with defaults filled in.
    CheckConfig {
        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build { config } => run_build(config),
        Commands::Demo {
            out_dir,
            entities,
            days,
            seed,
            output,
        } => run_demo(out_dir, entities, days, seed, output),
        Commands::CheckConfig { config } => run_check_config(config),
    }
}

fn run_build(path: PathBuf) -> Result<()> {
    let config = RunConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
    let outcome = run_pipeline(&config)?;
    print_outcome(&outcome);
    Ok(())
}

fn run_demo(out_dir: PathBuf, entities: usize, days: usize, seed: u64, output: String) -> Result<()> {
    if entities == 0 {
        bail!("--entities must be at least 1");
    }
    let spec = SyntheticSpec {
        entities,
        days,
        seed,
        ..SyntheticSpec::default()
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    tracing::info!(entities, days, seed, dir = %out_dir.display(), "writing demo sources");
    let config = write_demo_sources(&spec, &out_dir, &output, PipelineConfig::default())?;
    let outcome = run_pipeline(&config)?;
    print_outcome(&outcome);
    println!(
        "Sources and run config: {}",
        out_dir.join("run.toml").display()
    );
    Ok(())
}

fn run_check_config(path: PathBuf) -> Result<()> {
    let config = RunConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
    config.validate()?;
    println!("{}", config.to_toml_string()?);
    println!("# config hash: {}", config.config_hash()?);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    let r = &outcome.report;
    println!("Panel:    {} ({} rows x {} columns)", outcome.output.display(), outcome.rows, outcome.columns);
    println!("Features: {}", outcome.feature_list.display());
    println!("Manifest: {}", outcome.manifest.display());
    println!(
        "Join:     {} entities, {} unresolved securities, {} suffixed columns",
        r.join.entities,
        r.join.unresolved_securities.len(),
        r.join.suffixed_columns.len()
    );
    println!(
        "Clean:    {} sparse and {} superfluous columns dropped, {} gap-spanning changes",
        r.clean.sparse_columns.len(),
        r.clean.superfluous_columns.len(),
        r.clean.gaps.len()
    );
    println!(
        "Features: {} columns, {} rows without runway dropped",
        r.features.feature_columns.len(),
        r.features.rows_without_runway
    );
}
