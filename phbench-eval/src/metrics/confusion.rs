//! Binary confusion matrices and rank-based ROC-AUC

use phbench_common::config::NormalizePolicy;

use crate::stats::{checked_div, MetricValue};

/// Raw 2x2 confusion counts (rows: truth, columns: prediction)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

/// Normalized 2x2 confusion matrix
///
/// Cells in an empty row, column or matrix are undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfusionMatrix {
    pub tn: MetricValue,
    pub fp: MetricValue,
    pub fn_: MetricValue,
    pub tp: MetricValue,
}

impl ConfusionCounts {
    /// Count (truth, prediction) pairs
    pub fn from_pairs(pairs: &[(bool, bool)]) -> Self {
        let mut counts = Self::default();
        for &(truth, predicted) in pairs {
            match (truth, predicted) {
                (false, false) => counts.tn += 1,
                (false, true) => counts.fp += 1,
                (true, false) => counts.fn_ += 1,
                (true, true) => counts.tp += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    /// Fraction of correct predictions
    pub fn accuracy(&self) -> MetricValue {
        checked_div((self.tp + self.tn) as f64, self.total() as f64)
    }

    /// fp / (fp + tn), from the raw counts under every policy
    pub fn false_positive_rate(&self) -> MetricValue {
        checked_div(self.fp as f64, (self.fp + self.tn) as f64)
    }

    /// fn / (fn + tp), from the raw counts under every policy
    pub fn false_negative_rate(&self) -> MetricValue {
        checked_div(self.fn_ as f64, (self.fn_ + self.tp) as f64)
    }

    /// Normalize under `policy`
    pub fn normalize(&self, policy: NormalizePolicy) -> ConfusionMatrix {
        let (tn, fp, fn_, tp) = (
            self.tn as f64,
            self.fp as f64,
            self.fn_ as f64,
            self.tp as f64,
        );

        match policy {
            NormalizePolicy::True => {
                let negatives = tn + fp;
                let positives = fn_ + tp;
                ConfusionMatrix {
                    tn: checked_div(tn, negatives),
                    fp: checked_div(fp, negatives),
                    fn_: checked_div(fn_, positives),
                    tp: checked_div(tp, positives),
                }
            }
            NormalizePolicy::Pred => {
                let predicted_neg = tn + fn_;
                let predicted_pos = fp + tp;
                ConfusionMatrix {
                    tn: checked_div(tn, predicted_neg),
                    fp: checked_div(fp, predicted_pos),
                    fn_: checked_div(fn_, predicted_neg),
                    tp: checked_div(tp, predicted_pos),
                }
            }
            NormalizePolicy::All => {
                let total = tn + fp + fn_ + tp;
                ConfusionMatrix {
                    tn: checked_div(tn, total),
                    fp: checked_div(fp, total),
                    fn_: checked_div(fn_, total),
                    tp: checked_div(tp, total),
                }
            }
        }
    }
}

impl ConfusionMatrix {
    /// tp / (tp + fp)
    pub fn precision(&self) -> MetricValue {
        self.tp / (self.tp + self.fp)
    }

    /// tp / (tp + fn)
    pub fn recall(&self) -> MetricValue {
        self.tp / (self.tp + self.fn_)
    }

    /// Harmonic mean of precision and recall
    pub fn f1(&self) -> MetricValue {
        let precision = self.precision();
        let recall = self.recall();
        (MetricValue::Value(2.0) * precision * recall) / (precision + recall)
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic
///
/// Tied scores share their average rank. Undefined unless `truth` holds both
/// classes.
pub fn roc_auc(truth: &[bool], scores: &[f64]) -> MetricValue {
    debug_assert_eq!(truth.len(), scores.len());
    let n_pos = truth.iter().filter(|t| **t).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return MetricValue::Undefined;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based ranks, ties averaged
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg_rank;
        }
        start = end;
    }

    let pos_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t)
        .map(|(_, r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    checked_div(u, (n_pos * n_neg) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(value: MetricValue, expected: f64) -> bool {
        value.value().map_or(false, |v| (v - expected).abs() < 1e-9)
    }

    fn mixed() -> ConfusionCounts {
        ConfusionCounts {
            tn: 5,
            fp: 2,
            fn_: 1,
            tp: 4,
        }
    }

    #[test]
    fn test_from_pairs() {
        let counts = ConfusionCounts::from_pairs(&[
            (false, false),
            (false, true),
            (true, false),
            (true, true),
            (true, true),
        ]);
        assert_eq!(
            counts,
            ConfusionCounts {
                tn: 1,
                fp: 1,
                fn_: 1,
                tp: 2
            }
        );
        assert_eq!(counts.total(), 5);
        assert!(close(counts.accuracy(), 0.6));
    }

    #[test]
    fn test_error_rates_from_raw_counts() {
        assert!(close(mixed().false_positive_rate(), 2.0 / 7.0));
        assert!(close(mixed().false_negative_rate(), 0.2));
        assert!(ConfusionCounts::default().false_positive_rate().is_undefined());
        assert!(ConfusionCounts::default().false_negative_rate().is_undefined());
    }

    #[test]
    fn test_normalize_by_true_rows_sum_to_one() {
        let m = mixed().normalize(NormalizePolicy::True);
        assert!(close(m.tn + m.fp, 1.0));
        assert!(close(m.fn_ + m.tp, 1.0));
    }

    #[test]
    fn test_normalize_by_predicted_columns_sum_to_one() {
        let m = mixed().normalize(NormalizePolicy::Pred);
        assert!(close(m.tn + m.fn_, 1.0));
        assert!(close(m.fp + m.tp, 1.0));
    }

    #[test]
    fn test_normalize_by_total_sums_to_one() {
        let m = mixed().normalize(NormalizePolicy::All);
        assert!(close(m.tn + m.fp + m.fn_ + m.tp, 1.0));
    }

    #[test]
    fn test_empty_row_is_undefined_not_zero() {
        // Reference has no negatives
        let counts = ConfusionCounts {
            tn: 0,
            fp: 0,
            fn_: 2,
            tp: 0,
        };
        let m = counts.normalize(NormalizePolicy::True);
        assert!(m.tn.is_undefined());
        assert!(m.fp.is_undefined());
        assert_eq!(m.fn_, MetricValue::Value(1.0));
        assert_eq!(m.tp, MetricValue::Value(0.0));

        assert!(m.precision().is_undefined());
        assert_eq!(m.recall(), MetricValue::Value(0.0));
        assert!(m.f1().is_undefined());
    }

    #[test]
    fn test_empty_matrix_is_undefined() {
        let m = ConfusionCounts::default().normalize(NormalizePolicy::All);
        assert!(m.tn.is_undefined() && m.fp.is_undefined());
        assert!(m.fn_.is_undefined() && m.tp.is_undefined());
        assert!(ConfusionCounts::default().accuracy().is_undefined());
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let truth = [false, false, true, true];
        assert_eq!(roc_auc(&truth, &[0.0, 0.0, 1.0, 1.0]), MetricValue::Value(1.0));
        assert_eq!(roc_auc(&truth, &[1.0, 1.0, 0.0, 0.0]), MetricValue::Value(0.0));
    }

    #[test]
    fn test_roc_auc_ties_averaged() {
        // All scores tied: chance level
        let truth = [false, true, false, true];
        assert_eq!(roc_auc(&truth, &[1.0; 4]), MetricValue::Value(0.5));

        // Binary predictions: (TPR + TNR) / 2 = (1/2 + 1) / 2
        let truth = [false, false, true, true];
        assert!(close(roc_auc(&truth, &[0.0, 0.0, 1.0, 0.0]), 0.75));
    }

    #[test]
    fn test_roc_auc_single_class_is_undefined() {
        assert!(roc_auc(&[true, true], &[0.0, 1.0]).is_undefined());
        assert!(roc_auc(&[false], &[0.0]).is_undefined());
        assert!(roc_auc(&[], &[]).is_undefined());
    }
}
