//! End-to-end evaluation: stored documents to ranked metrics tables
//!
//! The summary of all stored documents is cached next to them as a CSV file
//! named after the parameters it was built with. Later runs read it back
//! instead of decoding every document again, until a refresh is requested.

use phbench_common::config::EvaluationConfig;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregator::{Aggregator, MaterialIndex};
use crate::error::EvalResult;
use crate::export::{read_summary_csv, write_summary_csv};
use crate::metrics::{MetricsEngine, MetricsTable};
use crate::summary::{FlagField, SummaryTable};

/// Everything one evaluation run produces
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Materials that passed the coverage filter
    pub n_materials: usize,
    pub summary: SummaryTable,
    pub regression: MetricsTable,
    /// One table per imaginary-mode flag
    pub classification: Vec<MetricsTable>,
}

impl Evaluation {
    /// Every metrics table, regression first
    pub fn tables(&self) -> impl Iterator<Item = &MetricsTable> {
        std::iter::once(&self.regression).chain(self.classification.iter())
    }
}

/// Filter `index` to materials with at least `coverage_k` sources and score them
pub fn evaluate(index: &MaterialIndex, config: &EvaluationConfig) -> Evaluation {
    let records = index.with_min_coverage(config.coverage_k);
    info!(
        materials = records.len(),
        total = index.len(),
        coverage_k = config.coverage_k,
        "Selected materials for evaluation"
    );

    let summary = SummaryTable::build(records.iter().copied(), config);
    score(summary, config)
}

/// Same as [`evaluate`], starting from an already built summary
pub fn evaluate_summary(summary: &SummaryTable, config: &EvaluationConfig) -> Evaluation {
    let selected = summary.with_min_coverage(config.coverage_k);
    info!(
        materials = selected.material_ids().len(),
        total = summary.material_ids().len(),
        coverage_k = config.coverage_k,
        "Selected materials for evaluation"
    );
    score(selected, config)
}

fn score(summary: SummaryTable, config: &EvaluationConfig) -> Evaluation {
    let engine = MetricsEngine::new(config.clone());

    let regression = engine.regression(&summary);
    let classification = FlagField::all_variants()
        .iter()
        .map(|field| engine.classification(&summary, *field))
        .collect();

    Evaluation {
        n_materials: summary.material_ids().len(),
        summary,
        regression,
        classification,
    }
}

/// Location of the cached summary for `config` under `root`
///
/// Only the parameters that change summary cells take part in the name.
pub fn summary_cache_path(root: &Path, config: &EvaluationConfig) -> PathBuf {
    root.join(format!(
        "summary-tol{}-peak{}.csv",
        config.imaginary_freq_tol, config.last_peak_threshold
    ))
}

/// Summary of every document under `root`
///
/// Reads the cached table when present. Otherwise, or when `refresh` is set,
/// scans and decodes the stored documents and rewrites the cache.
pub fn load_or_build_summary(
    root: &Path,
    config: &EvaluationConfig,
    refresh: bool,
) -> EvalResult<SummaryTable> {
    let cache_path = summary_cache_path(root, config);
    if !refresh && cache_path.is_file() {
        info!(path = %cache_path.display(), "Using cached summary");
        return read_summary_csv(&cache_path);
    }

    let index = Aggregator::new(root).scan()?;
    let summary = SummaryTable::build(index.iter(), config);
    write_summary_csv(&summary, &cache_path)?;
    info!(
        rows = summary.len(),
        refresh,
        path = %cache_path.display(),
        "Rebuilt summary cache"
    );
    Ok(summary)
}
