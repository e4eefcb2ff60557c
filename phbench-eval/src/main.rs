//! phbench-eval - phonon benchmark evaluation
//!
//! Scans the document cache, scores every force field against the reference
//! and prints (or writes) the ranked metrics tables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use phbench_common::config::{
    default_config_path, load_toml_config, NormalizePolicy, StorageRootResolver, TomlConfig,
};
use phbench_eval::export::{write_material_ids, write_metrics_csv, write_summary_csv};
use phbench_eval::{
    evaluate_summary, load_or_build_summary, Aggregator, MaterialIndex, StorageRoot,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "phbench-eval")]
#[command(about = "Benchmark ML force-field phonons against DFT reference results")]
#[command(version)]
struct Cli {
    /// Document cache root (empty string disables persistence)
    #[arg(long, global = true, env = "PHBENCH_STORAGE_ROOT")]
    storage_root: Option<String>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print regression and classification metrics
    Metrics {
        /// Minimum number of sources a material needs
        #[arg(long)]
        coverage_k: Option<usize>,

        /// Confusion matrix normalization (true, pred, all)
        #[arg(long, value_parser = parse_policy)]
        normalize: Option<NormalizePolicy>,

        /// Imaginary frequency tolerance (THz)
        #[arg(long)]
        tolerance: Option<f64>,

        /// Directory for CSV output
        #[arg(long)]
        out: Option<PathBuf>,

        /// Rebuild the cached summary from the stored documents
        #[arg(long)]
        refresh: bool,
    },

    /// Write the list of evaluated materials
    ExportIds {
        /// Output CSV file
        #[arg(long)]
        out: PathBuf,

        /// Minimum number of sources a material needs
        #[arg(long)]
        coverage_k: Option<usize>,
    },

    /// Print material counts per number of sources
    Summary,
}

fn parse_policy(value: &str) -> std::result::Result<NormalizePolicy, String> {
    NormalizePolicy::from_str(value)
        .ok_or_else(|| format!("unknown policy {:?} (expected true, pred or all)", value))
}

fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Ok(path) => path,
            Err(_) => return Ok(TomlConfig::default()),
        },
    };
    load_toml_config(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn require_root(storage_root: &StorageRoot) -> Result<&Path> {
    match storage_root.path() {
        Some(root) => Ok(root),
        None => bail!("Storage root is empty (persistence disabled): nothing to evaluate"),
    }
}

fn scan(storage_root: &StorageRoot) -> Result<MaterialIndex> {
    let root = require_root(storage_root)?;
    Aggregator::new(root)
        .scan()
        .with_context(|| format!("Failed to scan {}", root.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting phbench-eval v{}", env!("CARGO_PKG_VERSION"));

    let root_str = StorageRootResolver::new()
        .with_cli_arg(cli.storage_root.clone())
        .with_toml_value(config.storage_root.clone())
        .resolve();
    let storage_root = StorageRoot::from_path_str(&root_str);
    info!("Storage root: {:?}", root_str);

    match cli.command {
        Command::Metrics {
            coverage_k,
            normalize,
            tolerance,
            out,
            refresh,
        } => {
            let evaluation = &mut config.evaluation;
            if let Some(k) = coverage_k {
                evaluation.coverage_k = k;
            }
            if let Some(policy) = normalize {
                evaluation.normalize_policy = policy;
            }
            if let Some(tol) = tolerance {
                evaluation.imaginary_freq_tol = tol;
            }
            evaluation.validate()?;

            let root = require_root(&storage_root)?;
            let summary = load_or_build_summary(root, evaluation, refresh)
                .with_context(|| format!("Failed to load summary under {}", root.display()))?;
            let result = evaluate_summary(&summary, evaluation);

            println!(
                "Materials with >= {} sources: {}",
                evaluation.coverage_k, result.n_materials
            );
            for table in result.tables() {
                println!("\n[{}]", table.kind.name());
                print!("{}", table);
            }

            if let Some(dir) = out {
                for table in result.tables() {
                    let path = dir.join(format!("metrics-{}.csv", table.kind.name()));
                    write_metrics_csv(table, &path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                let path = dir.join("summary.csv");
                write_summary_csv(&result.summary, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("\nWrote CSV tables to {}", dir.display());
            }
        }

        Command::ExportIds { out, coverage_k } => {
            let k = coverage_k.unwrap_or(config.evaluation.coverage_k);
            if k == 0 {
                bail!("--coverage-k must be >= 1");
            }

            let index = scan(&storage_root)?;
            let records = index.with_min_coverage(k);
            let count = write_material_ids(records, &out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} material ids to {}", count, out.display());
        }

        Command::Summary => {
            let index = scan(&storage_root)?;
            println!(
                "{} materials, {} documents",
                index.len(),
                index.document_count()
            );
            for (coverage, count) in index.coverage_counts() {
                println!("  {} source(s): {} materials", coverage, count);
            }
        }
    }

    Ok(())
}
