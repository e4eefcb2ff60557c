//! Phonon density of states

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::stats::{self, MetricValue};

/// Phonon density of states on a frequency grid (THz)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DosData")]
pub struct PhononDos {
    frequencies: Vec<f64>,
    densities: Vec<f64>,
}

#[derive(Deserialize)]
struct DosData {
    frequencies: Vec<f64>,
    densities: Vec<f64>,
}

impl TryFrom<DosData> for PhononDos {
    type Error = EvalError;

    fn try_from(data: DosData) -> EvalResult<Self> {
        PhononDos::new(data.frequencies, data.densities)
    }
}

impl PhononDos {
    /// Create new density of states
    ///
    /// Frequencies must be strictly increasing; both vectors must have the same
    /// non-zero length and contain only finite values.
    pub fn new(frequencies: Vec<f64>, densities: Vec<f64>) -> EvalResult<Self> {
        if frequencies.is_empty() {
            return Err(EvalError::InvalidDocument("DOS has no points".to_string()));
        }
        if frequencies.len() != densities.len() {
            return Err(EvalError::InvalidDocument(format!(
                "DOS has {} frequencies but {} densities",
                frequencies.len(),
                densities.len()
            )));
        }
        if frequencies.iter().chain(&densities).any(|v| !v.is_finite()) {
            return Err(EvalError::InvalidDocument(
                "DOS contains non-finite values".to_string(),
            ));
        }
        if frequencies.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EvalError::InvalidDocument(
                "DOS frequencies must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            frequencies,
            densities,
        })
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Density at `freq`, linearly interpolated
    ///
    /// Outside the grid the edge value is returned.
    pub fn density_at(&self, freq: f64) -> f64 {
        let last = self.frequencies.len() - 1;
        if freq <= self.frequencies[0] {
            return self.densities[0];
        }
        if freq >= self.frequencies[last] {
            return self.densities[last];
        }

        // First grid point strictly above freq; 1..=last given the checks above
        let hi = self.frequencies.partition_point(|&f| f <= freq);
        let lo = hi - 1;
        let (f0, f1) = (self.frequencies[lo], self.frequencies[hi]);
        let (d0, d1) = (self.densities[lo], self.densities[hi]);
        d0 + (d1 - d0) * (freq - f0) / (f1 - f0)
    }

    /// Densities of `self` interpolated onto `grid`
    fn resample(&self, grid: &[f64]) -> Vec<f64> {
        grid.iter().map(|&f| self.density_at(f)).collect()
    }

    /// Mean |self - other| evaluated on self's grid
    fn one_sided_mae(&self, other: &PhononDos) -> f64 {
        let other_on_self = other.resample(&self.frequencies);
        let total: f64 = self
            .densities
            .iter()
            .zip(&other_on_self)
            .map(|(a, b)| (a - b).abs())
            .sum();
        total / self.densities.len() as f64
    }

    /// Two-sided mean absolute error against `reference`
    ///
    /// Average of the error on this grid and the error on the reference grid, so
    /// the result is symmetric in its arguments.
    pub fn mae(&self, reference: &PhononDos) -> f64 {
        (self.one_sided_mae(reference) + reference.one_sided_mae(self)) / 2.0
    }

    /// R² of this DOS against `reference` on the reference grid
    pub fn r2_score(&self, reference: &PhononDos) -> MetricValue {
        let predicted = self.resample(&reference.frequencies);
        stats::r2_score(&reference.densities, &predicted)
    }

    /// Highest density value
    pub fn max_density(&self) -> f64 {
        self.densities
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Frequency of the last significant peak
    ///
    /// A peak is a local maximum whose density is at least
    /// `threshold * max_density()`. Without any such peak, the frequency of
    /// the global maximum is returned.
    pub fn last_peak(&self, threshold: f64) -> f64 {
        let d = &self.densities;
        let n = d.len();
        let cutoff = threshold * self.max_density();

        let is_local_max = |i: usize| -> bool {
            let rises = i == 0 || d[i] > d[i - 1];
            let holds = i + 1 == n || d[i] >= d[i + 1];
            rises && holds
        };

        if let Some(i) = (0..n).rev().find(|&i| is_local_max(i) && d[i] >= cutoff) {
            return self.frequencies[i];
        }

        let mut best = 0;
        for i in 1..n {
            if d[i] > d[best] {
                best = i;
            }
        }
        self.frequencies[best]
    }
}
