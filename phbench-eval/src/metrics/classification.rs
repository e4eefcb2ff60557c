//! Classification metrics for imaginary-mode detection

use phbench_common::config::NormalizePolicy;
use phbench_common::Source;

use crate::metrics::confusion::{roc_auc, ConfusionCounts};
use crate::metrics::{MetricKey, MetricsRow};
use crate::stats::MetricValue;
use crate::summary::{FlagField, SummaryTable};

/// (reference flag, model flag) for every material where both exist
pub(crate) fn paired_flags(
    summary: &SummaryTable,
    field: FlagField,
    model: Source,
) -> Vec<(bool, bool)> {
    let reference = Source::reference();
    summary
        .material_ids()
        .into_iter()
        .filter_map(|id| {
            let predicted = summary.flag(id, model, field)?;
            let truth = summary.flag(id, reference, field)?;
            Some((truth, predicted))
        })
        .collect()
}

/// One classification row, aligned with [`MetricKey::CLASSIFICATION`]
///
/// Precision, recall and F1 come from the normalized matrix. Accuracy, the
/// error rates and ROC-AUC come from the raw flags, so they do not depend on
/// the policy.
pub(crate) fn score_model(
    model: Source,
    pairs: &[(bool, bool)],
    policy: NormalizePolicy,
) -> MetricsRow {
    let counts = ConfusionCounts::from_pairs(pairs);
    let matrix = counts.normalize(policy);

    let truth: Vec<bool> = pairs.iter().map(|(t, _)| *t).collect();
    let scores: Vec<f64> = pairs
        .iter()
        .map(|(_, p)| if *p { 1.0 } else { 0.0 })
        .collect();
    let auc = roc_auc(&truth, &scores);

    tracing::debug!(
        model = %model,
        n = pairs.len(),
        tn = counts.tn,
        fp = counts.fp,
        fn_ = counts.fn_,
        tp = counts.tp,
        "Scored classification"
    );

    let values = MetricKey::CLASSIFICATION
        .iter()
        .map(|key| match key {
            MetricKey::NMaterials => MetricValue::Value(pairs.len() as f64),
            MetricKey::Precision => matrix.precision(),
            MetricKey::Recall => matrix.recall(),
            MetricKey::F1 => matrix.f1(),
            MetricKey::RocAuc => auc,
            MetricKey::Accuracy => counts.accuracy(),
            MetricKey::FalsePositiveRate => counts.false_positive_rate(),
            MetricKey::FalseNegativeRate => counts.false_negative_rate(),
            _ => MetricValue::Undefined,
        })
        .collect();

    MetricsRow {
        source: model,
        values,
    }
}
