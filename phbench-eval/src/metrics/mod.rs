//! Cross-model metrics
//!
//! Scores every non-reference source against the reference over a
//! [`SummaryTable`]:
//! - Regression: DOS error, maximum frequency and last DOS peak
//! - Classification: imaginary-mode detection, anywhere and at the zone center
//!
//! All functions are pure in their input table. Quantities that cannot be
//! computed are reported as [`MetricValue::Undefined`], never as zero.

pub mod classification;
pub mod confusion;
pub mod regression;

use phbench_common::config::EvaluationConfig;
use phbench_common::Source;
use std::fmt;

use crate::stats::MetricValue;
use crate::summary::{FlagField, SummaryTable};

pub use confusion::{roc_auc, ConfusionCounts, ConfusionMatrix};
pub use regression::{paired_errors, PairedErrors};

// ============================================================================
// Column keys
// ============================================================================

/// Metric column identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    NMaterials,
    PhDosMae,
    PhDosR2,
    MaeMaxFreq,
    R2MaxFreq,
    MaeLastDosPeak,
    R2LastDosPeak,
    Precision,
    Recall,
    F1,
    RocAuc,
    Accuracy,
    FalsePositiveRate,
    FalseNegativeRate,
}

impl MetricKey {
    /// Regression table columns, in order
    pub const REGRESSION: [MetricKey; 7] = [
        MetricKey::NMaterials,
        MetricKey::PhDosMae,
        MetricKey::PhDosR2,
        MetricKey::MaeMaxFreq,
        MetricKey::R2MaxFreq,
        MetricKey::MaeLastDosPeak,
        MetricKey::R2LastDosPeak,
    ];

    /// Classification table columns, in order
    pub const CLASSIFICATION: [MetricKey; 8] = [
        MetricKey::NMaterials,
        MetricKey::Precision,
        MetricKey::Recall,
        MetricKey::F1,
        MetricKey::RocAuc,
        MetricKey::Accuracy,
        MetricKey::FalsePositiveRate,
        MetricKey::FalseNegativeRate,
    ];

    /// Machine-readable column name
    pub fn name(&self) -> &'static str {
        match self {
            MetricKey::NMaterials => "n_materials",
            MetricKey::PhDosMae => "ph_dos_mae_thz",
            MetricKey::PhDosR2 => "ph_dos_r2",
            MetricKey::MaeMaxFreq => "mae_max_freq_thz",
            MetricKey::R2MaxFreq => "r2_max_freq_thz",
            MetricKey::MaeLastDosPeak => "mae_last_ph_dos_peak_thz",
            MetricKey::R2LastDosPeak => "r2_last_ph_dos_peak_thz",
            MetricKey::Precision => "prec",
            MetricKey::Recall => "recall",
            MetricKey::F1 => "f1",
            MetricKey::RocAuc => "roc_auc",
            MetricKey::Accuracy => "acc",
            MetricKey::FalsePositiveRate => "fpr",
            MetricKey::FalseNegativeRate => "fnr",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::NMaterials => "Materials",
            MetricKey::PhDosMae => "MAE ph DOS (THz)",
            MetricKey::PhDosR2 => "R² ph DOS",
            MetricKey::MaeMaxFreq => "MAE ω_max (THz)",
            MetricKey::R2MaxFreq => "R² ω_max",
            MetricKey::MaeLastDosPeak => "MAE last DOS peak (THz)",
            MetricKey::R2LastDosPeak => "R² last DOS peak",
            MetricKey::Precision => "Precision",
            MetricKey::Recall => "Recall",
            MetricKey::F1 => "F1",
            MetricKey::RocAuc => "ROC-AUC",
            MetricKey::Accuracy => "Accuracy",
            MetricKey::FalsePositiveRate => "FPR",
            MetricKey::FalseNegativeRate => "FNR",
        }
    }

    /// Ranking direction
    pub fn higher_is_better(&self) -> bool {
        !matches!(
            self,
            MetricKey::PhDosMae
                | MetricKey::MaeMaxFreq
                | MetricKey::MaeLastDosPeak
                | MetricKey::FalsePositiveRate
                | MetricKey::FalseNegativeRate
        )
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Tables
// ============================================================================

/// What a metrics table scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsKind {
    Regression,
    Classification(FlagField),
}

impl MetricsKind {
    /// Short name used for file names and headings
    pub fn name(&self) -> &'static str {
        match self {
            MetricsKind::Regression => "regression",
            MetricsKind::Classification(FlagField::ImaginaryFreq) => "imaginary-freq",
            MetricsKind::Classification(FlagField::ImaginaryGammaFreq) => "imaginary-gamma-freq",
        }
    }

    /// Column that orders the rows
    pub fn sort_key(&self) -> MetricKey {
        match self {
            MetricsKind::Regression => MetricKey::PhDosMae,
            MetricsKind::Classification(_) => MetricKey::RocAuc,
        }
    }
}

/// Metric values of one model, aligned with the table columns
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub source: Source,
    pub values: Vec<MetricValue>,
}

/// Models x metrics
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    pub kind: MetricsKind,
    pub columns: Vec<MetricKey>,
    pub rows: Vec<MetricsRow>,
}

impl MetricsTable {
    fn new(kind: MetricsKind, columns: &[MetricKey]) -> Self {
        Self {
            kind,
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&self, source: Source) -> Option<&MetricsRow> {
        self.rows.iter().find(|r| r.source == source)
    }

    /// Value at (source, key); `None` when the table has no such row or column
    pub fn get(&self, source: Source, key: MetricKey) -> Option<MetricValue> {
        let col = self.columns.iter().position(|c| *c == key)?;
        self.row(source).map(|r| r.values[col])
    }

    /// Models in ranking order
    pub fn sources(&self) -> Vec<Source> {
        self.rows.iter().map(|r| r.source).collect()
    }

    /// Order rows by the sort column; undefined last, ties in registry order
    fn sort(&mut self) {
        let key = self.kind.sort_key();
        let Some(col) = self.columns.iter().position(|c| *c == key) else {
            return;
        };
        let higher_is_better = key.higher_is_better();
        self.rows.sort_by(|a, b| {
            a.values[col]
                .rank_cmp(&b.values[col], higher_is_better)
                .then_with(|| a.source.registry_index().cmp(&b.source.registry_index()))
        });
    }
}

/// Render a cell for display
pub fn format_cell(key: MetricKey, value: MetricValue) -> String {
    match (key, value) {
        (MetricKey::NMaterials, MetricValue::Value(v)) => format!("{:.0}", v),
        (_, v) => format!("{:.3}", v),
    }
}

impl fmt::Display for MetricsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MODEL_WIDTH: usize = 16;

        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| c.name().len().max(9))
            .collect();

        write!(f, "{:<w$}", "model", w = MODEL_WIDTH)?;
        for (col, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>w$}", col.name(), w = *width)?;
        }
        writeln!(f)?;

        for row in &self.rows {
            write!(f, "{:<w$}", row.source.label(), w = MODEL_WIDTH)?;
            for ((col, value), width) in self.columns.iter().zip(&row.values).zip(&widths) {
                write!(f, "  {:>w$}", format_cell(*col, *value), w = *width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Scores models against the reference source
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: EvaluationConfig,
}

impl MetricsEngine {
    /// Create new engine
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Non-reference sources present in the table, in registry order
    fn models(summary: &SummaryTable) -> Vec<Source> {
        summary
            .sources()
            .into_iter()
            .filter(|s| !s.is_reference())
            .collect()
    }

    /// Regression metrics, ascending by DOS MAE
    pub fn regression(&self, summary: &SummaryTable) -> MetricsTable {
        let mut table = MetricsTable::new(MetricsKind::Regression, &MetricKey::REGRESSION);
        for model in Self::models(summary) {
            table.rows.push(regression::score_model(summary, model));
        }
        table.sort();
        tracing::debug!(models = table.rows.len(), "Computed regression metrics");
        table
    }

    /// Classification metrics for `field`, descending by ROC-AUC
    pub fn classification(&self, summary: &SummaryTable, field: FlagField) -> MetricsTable {
        let mut table = MetricsTable::new(
            MetricsKind::Classification(field),
            &MetricKey::CLASSIFICATION,
        );
        for model in Self::models(summary) {
            let pairs = classification::paired_flags(summary, field, model);
            table.rows.push(classification::score_model(
                model,
                &pairs,
                self.config.normalize_policy,
            ));
        }
        table.sort();
        tracing::debug!(
            models = table.rows.len(),
            field = field.name(),
            policy = %self.config.normalize_policy,
            "Computed classification metrics"
        );
        table
    }

    /// Raw confusion counts of `model` for `field`
    ///
    /// `None` for the reference source or a model absent from the table.
    pub fn confusion(
        &self,
        summary: &SummaryTable,
        field: FlagField,
        model: Source,
    ) -> Option<ConfusionCounts> {
        if model.is_reference() || !summary.sources().contains(&model) {
            return None;
        }
        let pairs = classification::paired_flags(summary, field, model);
        Some(ConfusionCounts::from_pairs(&pairs))
    }
}
