//! Per-material summary table
//!
//! One row per (material, source) holding the scalar properties the metrics
//! engine compares. Fields whose inputs are missing stay `None`; a DOS R² that
//! was computed but is undefined is kept as [`MetricValue::Undefined`].

use phbench_common::config::EvaluationConfig;
use phbench_common::Source;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::aggregator::MaterialRecord;
use crate::error::{EvalError, EvalResult};
use crate::stats::MetricValue;

/// Numeric summary columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    MaxFreq,
    MinFreq,
    LastDosPeak,
    DosMae,
    DosR2,
}

impl NumericField {
    pub fn all_variants() -> &'static [NumericField] {
        &[
            NumericField::MaxFreq,
            NumericField::MinFreq,
            NumericField::LastDosPeak,
            NumericField::DosMae,
            NumericField::DosR2,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            NumericField::MaxFreq => "max_freq_thz",
            NumericField::MinFreq => "min_freq_thz",
            NumericField::LastDosPeak => "last_ph_dos_peak_thz",
            NumericField::DosMae => "ph_dos_mae_thz",
            NumericField::DosR2 => "ph_dos_r2",
        }
    }
}

/// Boolean summary columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagField {
    /// Imaginary mode anywhere on the band path
    ImaginaryFreq,
    /// Imaginary mode at the zone center
    ImaginaryGammaFreq,
}

impl FlagField {
    pub fn all_variants() -> &'static [FlagField] {
        &[FlagField::ImaginaryFreq, FlagField::ImaginaryGammaFreq]
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlagField::ImaginaryFreq => "has_imag_freq",
            FlagField::ImaginaryGammaFreq => "has_imag_gamma_freq",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FlagField::ImaginaryFreq => "Imaginary modes",
            FlagField::ImaginaryGammaFreq => "Imaginary modes at Γ",
        }
    }
}

/// Scalar properties of one (material, source) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub material_id: String,
    pub formula: String,
    pub source: Source,
    pub max_freq: Option<f64>,
    pub min_freq: Option<f64>,
    pub last_dos_peak: Option<f64>,
    pub dos_mae: Option<f64>,
    pub dos_r2: Option<MetricValue>,
    pub has_imaginary_freq: Option<bool>,
    pub has_imaginary_gamma_freq: Option<bool>,
}

impl SummaryRow {
    /// Empty row for (material, source)
    pub fn new(material_id: &str, formula: &str, source: Source) -> Self {
        Self {
            material_id: material_id.to_string(),
            formula: formula.to_string(),
            source,
            max_freq: None,
            min_freq: None,
            last_dos_peak: None,
            dos_mae: None,
            dos_r2: None,
            has_imaginary_freq: None,
            has_imaginary_gamma_freq: None,
        }
    }

    /// Defined value of `field`, if any
    pub fn numeric(&self, field: NumericField) -> Option<f64> {
        self.metric(field).and_then(|v| v.value())
    }

    /// Cell of `field`: `None` when its inputs were missing
    pub fn metric(&self, field: NumericField) -> Option<MetricValue> {
        match field {
            NumericField::MaxFreq => self.max_freq.map(MetricValue::Value),
            NumericField::MinFreq => self.min_freq.map(MetricValue::Value),
            NumericField::LastDosPeak => self.last_dos_peak.map(MetricValue::Value),
            NumericField::DosMae => self.dos_mae.map(MetricValue::Value),
            NumericField::DosR2 => self.dos_r2,
        }
    }

    pub fn flag(&self, field: FlagField) -> Option<bool> {
        match field {
            FlagField::ImaginaryFreq => self.has_imaginary_freq,
            FlagField::ImaginaryGammaFreq => self.has_imaginary_gamma_freq,
        }
    }
}

/// Summary rows keyed by (material, source)
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    rows: BTreeMap<(String, Source), SummaryRow>,
}

impl SummaryTable {
    /// Summarize every document of every record
    pub fn build<'a, I>(records: I, config: &EvaluationConfig) -> Self
    where
        I: IntoIterator<Item = &'a MaterialRecord>,
    {
        let tol = config.imaginary_freq_tol;
        let mut rows = BTreeMap::new();

        for record in records {
            let reference_dos = record.reference().and_then(|doc| doc.dos());

            for (&source, doc) in record.documents() {
                let mut row = SummaryRow::new(record.material_id(), record.formula(), source);

                if let Some(bs) = doc.band_structure() {
                    row.max_freq = Some(bs.max_freq());
                    row.min_freq = Some(bs.min_freq());
                }
                if let Some(flags) = doc.derived_flags(tol) {
                    row.has_imaginary_freq = Some(flags.has_imaginary_freq);
                    row.has_imaginary_gamma_freq = Some(flags.has_imaginary_gamma_freq);
                }
                if let Some(dos) = doc.dos() {
                    row.last_dos_peak = Some(dos.last_peak(config.last_peak_threshold));

                    if !source.is_reference() {
                        if let Some(reference) = reference_dos {
                            row.dos_mae = Some(dos.mae(reference));
                            let r2 = dos.r2_score(reference);
                            if r2.is_undefined() {
                                debug!(
                                    material_id = record.material_id(),
                                    source = %source,
                                    "DOS R² undefined (flat reference DOS)"
                                );
                            }
                            row.dos_r2 = Some(r2);
                        }
                    }
                }

                rows.insert((record.material_id().to_string(), source), row);
            }
        }

        debug!(rows = rows.len(), tolerance = tol, "Built summary table");
        Self { rows }
    }

    /// Build a table from prepared rows
    ///
    /// A repeated (material, source) pair is an inconsistency.
    pub fn from_rows<I>(rows: I) -> EvalResult<Self>
    where
        I: IntoIterator<Item = SummaryRow>,
    {
        let mut table = BTreeMap::new();
        for row in rows {
            let source = row.source;
            let key = (row.material_id.clone(), source);
            if table.contains_key(&key) {
                return Err(EvalError::InconsistentDocument(format!(
                    "duplicate summary row for {} ({})",
                    row.material_id, source
                )));
            }
            table.insert(key, row);
        }
        Ok(Self { rows: table })
    }

    pub fn row(&self, material_id: &str, source: Source) -> Option<&SummaryRow> {
        self.rows.get(&(material_id.to_string(), source))
    }

    pub fn numeric(&self, material_id: &str, source: Source, field: NumericField) -> Option<f64> {
        self.row(material_id, source).and_then(|r| r.numeric(field))
    }

    pub fn metric(
        &self,
        material_id: &str,
        source: Source,
        field: NumericField,
    ) -> Option<MetricValue> {
        self.row(material_id, source).and_then(|r| r.metric(field))
    }

    pub fn flag(&self, material_id: &str, source: Source, field: FlagField) -> Option<bool> {
        self.row(material_id, source).and_then(|r| r.flag(field))
    }

    /// Rows ordered by material id, then registry order
    pub fn rows(&self) -> impl Iterator<Item = &SummaryRow> {
        self.rows.values()
    }

    /// Sources with at least one row, in registry order
    pub fn sources(&self) -> Vec<Source> {
        let present: BTreeSet<Source> = self.rows.keys().map(|(_, s)| *s).collect();
        present.into_iter().collect()
    }

    /// Number of sources with a row for `material_id`
    pub fn coverage(&self, material_id: &str) -> usize {
        self.rows.keys().filter(|(id, _)| id == material_id).count()
    }

    /// Rows of the materials covered by at least `k` sources
    pub fn with_min_coverage(&self, k: usize) -> SummaryTable {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (id, _) in self.rows.keys() {
            *counts.entry(id.as_str()).or_insert(0) += 1;
        }
        let rows = self
            .rows
            .iter()
            .filter(|((id, _), _)| counts.get(id.as_str()).copied().unwrap_or(0) >= k)
            .map(|(key, row)| (key.clone(), row.clone()))
            .collect();
        Self { rows }
    }

    /// Material ids with at least one row, in order
    pub fn material_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.rows.keys().map(|(id, _)| id.as_str()).collect();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, source: Source, max_freq: Option<f64>) -> SummaryRow {
        SummaryRow {
            max_freq,
            ..SummaryRow::new(id, "Si", source)
        }
    }

    #[test]
    fn test_from_rows_and_lookup() {
        let table = SummaryTable::from_rows(vec![
            row("mp-2", Source::MaceMp, Some(3.0)),
            row("mp-1", Source::Pbe, Some(1.0)),
            row("mp-2", Source::Pbe, None),
        ])
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.numeric("mp-1", Source::Pbe, NumericField::MaxFreq), Some(1.0));
        assert_eq!(table.numeric("mp-2", Source::Pbe, NumericField::MaxFreq), None);
        assert_eq!(table.numeric("mp-3", Source::Pbe, NumericField::MaxFreq), None);
        assert_eq!(table.sources(), vec![Source::Pbe, Source::MaceMp]);
        assert_eq!(table.material_ids(), vec!["mp-1", "mp-2"]);
    }

    #[test]
    fn test_from_rows_rejects_duplicates() {
        let result = SummaryTable::from_rows(vec![
            row("mp-1", Source::Pbe, Some(1.0)),
            row("mp-1", Source::Pbe, Some(2.0)),
        ]);
        assert!(matches!(result, Err(EvalError::InconsistentDocument(_))));
    }

    #[test]
    fn test_with_min_coverage() {
        let table = SummaryTable::from_rows(vec![
            row("mp-1", Source::Pbe, Some(1.0)),
            row("mp-1", Source::MaceMp, Some(1.0)),
            row("mp-1", Source::Gnome, None),
            row("mp-2", Source::Pbe, Some(2.0)),
            row("mp-2", Source::MaceMp, Some(2.0)),
            row("mp-3", Source::Pbe, Some(3.0)),
        ])
        .unwrap();

        assert_eq!(table.coverage("mp-1"), 3);
        assert_eq!(table.coverage("mp-4"), 0);
        assert_eq!(table.with_min_coverage(2).material_ids(), vec!["mp-1", "mp-2"]);
        assert_eq!(table.with_min_coverage(3).len(), 3);
        assert!(table.with_min_coverage(4).is_empty());
    }

    #[test]
    fn test_undefined_cell_is_kept_apart_from_missing() {
        let mut model = row("mp-1", Source::MaceMp, Some(2.0));
        model.dos_r2 = Some(MetricValue::Undefined);
        let table = SummaryTable::from_rows(vec![model]).unwrap();

        assert_eq!(
            table.metric("mp-1", Source::MaceMp, NumericField::DosR2),
            Some(MetricValue::Undefined)
        );
        assert_eq!(table.numeric("mp-1", Source::MaceMp, NumericField::DosR2), None);
        assert_eq!(table.metric("mp-1", Source::MaceMp, NumericField::DosMae), None);
        assert_eq!(
            table.metric("mp-1", Source::MaceMp, NumericField::MaxFreq),
            Some(MetricValue::Value(2.0))
        );
    }

    #[test]
    fn test_field_names_unique() {
        let mut names: Vec<_> = NumericField::all_variants().iter().map(|f| f.name()).collect();
        names.extend(FlagField::all_variants().iter().map(|f| f.name()));
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }
}
