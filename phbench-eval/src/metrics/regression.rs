//! Regression metrics: model scalars against reference scalars

use phbench_common::Source;

use crate::metrics::{MetricKey, MetricsRow};
use crate::stats::{self, MetricValue};
use crate::summary::{NumericField, SummaryTable};

/// Errors over the pairs where both values exist
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairedErrors {
    /// Number of complete pairs
    pub n: usize,
    pub mae: MetricValue,
    pub r2: MetricValue,
}

/// MAE and R² of `model` against `reference`
///
/// Positions where either side is `None` are dropped, never zero-filled. R² is
/// undefined below two pairs or when the reference values are constant.
pub fn paired_errors(reference: &[Option<f64>], model: &[Option<f64>]) -> PairedErrors {
    debug_assert_eq!(reference.len(), model.len());
    let (truth, predicted): (Vec<f64>, Vec<f64>) = reference
        .iter()
        .zip(model)
        .filter_map(|(r, m)| Some(((*r)?, (*m)?)))
        .unzip();

    PairedErrors {
        n: truth.len(),
        mae: stats::mean_absolute_error(&truth, &predicted),
        r2: stats::r2_score(&truth, &predicted),
    }
}

/// Reference and model column of `field`, aligned by material
fn paired_column(
    summary: &SummaryTable,
    field: NumericField,
    model: Source,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let reference = Source::reference();
    summary
        .material_ids()
        .into_iter()
        .map(|id| {
            (
                summary.numeric(id, reference, field),
                summary.numeric(id, model, field),
            )
        })
        .unzip()
}

/// Mean of a per-model column over the materials where it exists
///
/// Missing cells are skipped. A single undefined cell makes the mean undefined.
fn column_mean(summary: &SummaryTable, field: NumericField, model: Source) -> MetricValue {
    let mut values = Vec::new();
    for cell in summary
        .material_ids()
        .into_iter()
        .filter_map(|id| summary.metric(id, model, field))
    {
        match cell {
            MetricValue::Value(v) => values.push(v),
            MetricValue::Undefined => {
                tracing::debug!(
                    model = %model,
                    field = field.name(),
                    "Column has an undefined cell"
                );
                return MetricValue::Undefined;
            }
        }
    }
    stats::mean(&values)
}

/// One regression row, aligned with [`MetricKey::REGRESSION`]
pub(crate) fn score_model(summary: &SummaryTable, model: Source) -> MetricsRow {
    let n_materials = summary
        .material_ids()
        .into_iter()
        .filter(|id| summary.row(id, model).is_some())
        .count();

    let (ref_max, model_max) = paired_column(summary, NumericField::MaxFreq, model);
    let max_freq = paired_errors(&ref_max, &model_max);
    let (ref_peak, model_peak) = paired_column(summary, NumericField::LastDosPeak, model);
    let last_peak = paired_errors(&ref_peak, &model_peak);

    tracing::debug!(
        model = %model,
        n_materials,
        max_freq_pairs = max_freq.n,
        last_peak_pairs = last_peak.n,
        "Scored regression"
    );

    let values = MetricKey::REGRESSION
        .iter()
        .map(|key| match key {
            MetricKey::NMaterials => MetricValue::Value(n_materials as f64),
            MetricKey::PhDosMae => column_mean(summary, NumericField::DosMae, model),
            MetricKey::PhDosR2 => column_mean(summary, NumericField::DosR2, model),
            MetricKey::MaeMaxFreq => max_freq.mae,
            MetricKey::R2MaxFreq => max_freq.r2,
            MetricKey::MaeLastDosPeak => last_peak.mae,
            MetricKey::R2LastDosPeak => last_peak.r2,
            _ => MetricValue::Undefined,
        })
        .collect();

    MetricsRow {
        source: model,
        values,
    }
}
