//! Phonon band structure along a high-symmetry path

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Coordinates within this distance of zero are the zone center
pub const ZONE_CENTER_TOL: f64 = 1e-8;

/// Labelled q-point on the band path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighSymmetryPoint {
    pub label: String,
    /// Index into the q-point list
    pub index: usize,
}

/// Phonon frequencies (THz) per branch along a q-point path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BandStructureData")]
pub struct BandStructure {
    qpoints: Vec<[f64; 3]>,
    /// branch x q-point
    frequencies: Vec<Vec<f64>>,
    labels: Vec<HighSymmetryPoint>,
}

#[derive(Deserialize)]
struct BandStructureData {
    qpoints: Vec<[f64; 3]>,
    frequencies: Vec<Vec<f64>>,
    labels: Vec<HighSymmetryPoint>,
}

impl TryFrom<BandStructureData> for BandStructure {
    type Error = EvalError;

    fn try_from(data: BandStructureData) -> EvalResult<Self> {
        BandStructure::new(data.qpoints, data.frequencies, data.labels)
    }
}

fn is_zone_center(q: &[f64; 3]) -> bool {
    q.iter().all(|c| c.abs() <= ZONE_CENTER_TOL)
}

impl BandStructure {
    /// Create new band structure
    ///
    /// Requires at least one branch and q-point, one frequency per q-point on
    /// every branch, finite values, in-range label indices and at least one
    /// labelled point at the zone center.
    pub fn new(
        qpoints: Vec<[f64; 3]>,
        frequencies: Vec<Vec<f64>>,
        labels: Vec<HighSymmetryPoint>,
    ) -> EvalResult<Self> {
        if qpoints.is_empty() || frequencies.is_empty() {
            return Err(EvalError::InvalidDocument(
                "band structure needs at least one branch and q-point".to_string(),
            ));
        }
        if let Some((idx, branch)) = frequencies
            .iter()
            .enumerate()
            .find(|(_, b)| b.len() != qpoints.len())
        {
            return Err(EvalError::InvalidDocument(format!(
                "branch {} has {} values for {} q-points",
                idx,
                branch.len(),
                qpoints.len()
            )));
        }
        if qpoints.iter().flatten().any(|c| !c.is_finite())
            || frequencies.iter().flatten().any(|f| !f.is_finite())
        {
            return Err(EvalError::InvalidDocument(
                "band structure contains non-finite values".to_string(),
            ));
        }
        if let Some(point) = labels.iter().find(|p| p.index >= qpoints.len()) {
            return Err(EvalError::InvalidDocument(format!(
                "label {:?} points at q-point {} of {}",
                point.label,
                point.index,
                qpoints.len()
            )));
        }
        if !labels.iter().any(|p| is_zone_center(&qpoints[p.index])) {
            return Err(EvalError::InvalidDocument(
                "no labelled point at the zone center".to_string(),
            ));
        }

        Ok(Self {
            qpoints,
            frequencies,
            labels,
        })
    }

    pub fn qpoints(&self) -> &[[f64; 3]] {
        &self.qpoints
    }

    pub fn frequencies(&self) -> &[Vec<f64>] {
        &self.frequencies
    }

    pub fn labels(&self) -> &[HighSymmetryPoint] {
        &self.labels
    }

    pub fn n_branches(&self) -> usize {
        self.frequencies.len()
    }

    /// Highest frequency over all branches and q-points
    pub fn max_freq(&self) -> f64 {
        self.frequencies
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Lowest frequency over all branches and q-points
    pub fn min_freq(&self) -> f64 {
        self.frequencies
            .iter()
            .flatten()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// Indices of every q-point at the zone center
    pub fn zone_center_indices(&self) -> Vec<usize> {
        self.qpoints
            .iter()
            .enumerate()
            .filter(|(_, q)| is_zone_center(q))
            .map(|(i, _)| i)
            .collect()
    }

    /// Any mode below `-tol`
    pub fn has_imaginary_freq(&self, tol: f64) -> bool {
        self.min_freq() < -tol
    }

    /// Any mode below `-tol` at a zone-center q-point
    pub fn has_imaginary_gamma_freq(&self, tol: f64) -> bool {
        let centers = self.zone_center_indices();
        self.frequencies
            .iter()
            .any(|branch| centers.iter().any(|&i| branch[i] < -tol))
    }
}
