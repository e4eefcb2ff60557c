//! Checked statistics
//!
//! Every ratio in the metrics engine goes through [`checked_div`] so that an
//! empty denominator turns into [`MetricValue::Undefined`] instead of NaN or a
//! silent zero.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul};

/// A metric that may be undefined
///
/// `Value` always holds a finite number.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "StoredMetric")]
pub enum MetricValue {
    Value(f64),
    Undefined,
}

impl MetricValue {
    /// Wrap a float; NaN and infinities become `Undefined`
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Value(value)
        } else {
            MetricValue::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, MetricValue::Undefined)
    }

    /// Apply `f` to a defined value
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            MetricValue::Value(v) => MetricValue::from_f64(f(v)),
            MetricValue::Undefined => MetricValue::Undefined,
        }
    }

    /// Ordering for ranking: defined values by `cmp`, undefined always last
    pub fn rank_cmp(&self, other: &MetricValue, higher_is_better: bool) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => {
                let ord = a.total_cmp(&b);
                if higher_is_better {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl Add for MetricValue {
    type Output = MetricValue;

    fn add(self, other: MetricValue) -> MetricValue {
        match (self, other) {
            (MetricValue::Value(a), MetricValue::Value(b)) => MetricValue::from_f64(a + b),
            _ => MetricValue::Undefined,
        }
    }
}

impl Mul for MetricValue {
    type Output = MetricValue;

    fn mul(self, other: MetricValue) -> MetricValue {
        match (self, other) {
            (MetricValue::Value(a), MetricValue::Value(b)) => MetricValue::from_f64(a * b),
            _ => MetricValue::Undefined,
        }
    }
}

/// Undefined if either operand is, or the divisor is zero
impl Div for MetricValue {
    type Output = MetricValue;

    fn div(self, other: MetricValue) -> MetricValue {
        match (self, other) {
            (MetricValue::Value(a), MetricValue::Value(b)) => checked_div(a, b),
            _ => MetricValue::Undefined,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::from_f64(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Value(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{}", v),
            },
            MetricValue::Undefined => f.pad("undefined"),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Value(v) => serializer.serialize_f64(*v),
            MetricValue::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

/// On-disk form of a [`MetricValue`]: a number or the word `undefined`
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredMetric {
    Number(f64),
    Text(String),
}

impl TryFrom<StoredMetric> for MetricValue {
    type Error = String;

    fn try_from(stored: StoredMetric) -> Result<Self, Self::Error> {
        match stored {
            StoredMetric::Number(v) if v.is_finite() => Ok(MetricValue::Value(v)),
            StoredMetric::Number(v) => Err(format!("non-finite metric value {}", v)),
            StoredMetric::Text(text) if text == "undefined" => Ok(MetricValue::Undefined),
            StoredMetric::Text(text) => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(MetricValue::Value)
                .ok_or_else(|| format!("invalid metric value {:?}", text)),
        }
    }
}

/// `num / den`, undefined when `den` is zero or the result is not finite
pub fn checked_div(num: f64, den: f64) -> MetricValue {
    if den == 0.0 {
        return MetricValue::Undefined;
    }
    MetricValue::from_f64(num / den)
}

/// Arithmetic mean; undefined for an empty input
pub fn mean(values: &[f64]) -> MetricValue {
    checked_div(values.iter().sum(), values.len() as f64)
}

/// Mean absolute difference between paired slices
pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> MetricValue {
    debug_assert_eq!(truth.len(), predicted.len());
    let total: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).abs())
        .sum();
    checked_div(total, truth.len() as f64)
}

/// Coefficient of determination with `truth` as ground truth
///
/// Undefined with fewer than two points or when `truth` has zero variance.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> MetricValue {
    debug_assert_eq!(truth.len(), predicted.len());
    if truth.len() < 2 {
        return MetricValue::Undefined;
    }

    let truth_mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - truth_mean).powi(2)).sum();
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    checked_div(ss_res, ss_tot).map(|ratio| 1.0 - ratio)
}
