//! Phonon document: one material computed by one source

use phbench_common::Source;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::key::StorageKey;
use crate::models::{BandStructure, PhononDos};

/// Imaginary-mode flags derived from a band structure at a given tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFlags {
    pub tolerance: f64,
    pub has_imaginary_freq: bool,
    pub has_imaginary_gamma_freq: bool,
}

/// Phonon results for one (material, source) pair
///
/// Immutable once constructed. Derived quantities are computed on demand and
/// never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentData")]
pub struct PhononDocument {
    material_id: String,
    formula: String,
    source: Source,
    dos: Option<PhononDos>,
    band_structure: Option<BandStructure>,
}

#[derive(Deserialize)]
struct DocumentData {
    material_id: String,
    formula: String,
    source: Source,
    #[serde(default)]
    dos: Option<PhononDos>,
    #[serde(default)]
    band_structure: Option<BandStructure>,
}

impl TryFrom<DocumentData> for PhononDocument {
    type Error = EvalError;

    fn try_from(data: DocumentData) -> EvalResult<Self> {
        PhononDocument::new(
            data.material_id,
            data.formula,
            data.source,
            data.dos,
            data.band_structure,
        )
    }
}

/// Material id: non-empty, not dot-prefixed, no path separator, no whitespace
pub fn validate_material_id(material_id: &str) -> EvalResult<()> {
    if material_id.is_empty() {
        return Err(EvalError::InvalidDocument("empty material id".to_string()));
    }
    // Dot-prefixed directories are skipped by the aggregator
    if material_id.starts_with('.') {
        return Err(EvalError::InvalidDocument(format!(
            "material id {:?} starts with a dot",
            material_id
        )));
    }
    if material_id.contains('/') || material_id.chars().any(char::is_whitespace) {
        return Err(EvalError::InvalidDocument(format!(
            "material id {:?} contains a path separator or whitespace",
            material_id
        )));
    }
    Ok(())
}

/// Formula shape: an uppercase letter followed by letters, digits, `(`, `)` or `.`
pub fn is_valid_formula(formula: &str) -> bool {
    let mut chars = formula.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '(' | ')' | '.'))
}

impl PhononDocument {
    /// Create new document
    ///
    /// Every payload the source advertises in its capabilities must be present.
    pub fn new(
        material_id: impl Into<String>,
        formula: impl Into<String>,
        source: Source,
        dos: Option<PhononDos>,
        band_structure: Option<BandStructure>,
    ) -> EvalResult<Self> {
        let material_id = material_id.into();
        let formula = formula.into();

        validate_material_id(&material_id)?;
        if !is_valid_formula(&formula) {
            return Err(EvalError::InvalidDocument(format!(
                "formula {:?} is not a reduced chemical formula",
                formula
            )));
        }

        let caps = source.capabilities();
        if caps.dos && dos.is_none() {
            return Err(EvalError::InvalidDocument(format!(
                "{} document for {} is missing its DOS",
                source, material_id
            )));
        }
        if caps.band_structure && band_structure.is_none() {
            return Err(EvalError::InvalidDocument(format!(
                "{} document for {} is missing its band structure",
                source, material_id
            )));
        }

        Ok(Self {
            material_id,
            formula,
            source,
            dos,
            band_structure,
        })
    }

    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn dos(&self) -> Option<&PhononDos> {
        self.dos.as_ref()
    }

    pub fn band_structure(&self) -> Option<&BandStructure> {
        self.band_structure.as_ref()
    }

    /// Imaginary-mode flags at tolerance `tol`; `None` without a band structure
    pub fn derived_flags(&self, tol: f64) -> Option<DerivedFlags> {
        self.band_structure.as_ref().map(|bs| DerivedFlags {
            tolerance: tol,
            has_imaginary_freq: bs.has_imaginary_freq(tol),
            has_imaginary_gamma_freq: bs.has_imaginary_gamma_freq(tol),
        })
    }

    /// Location of this document under the storage root
    pub fn storage_key(&self) -> StorageKey {
        StorageKey::new_unchecked(&self.material_id, &self.formula, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HighSymmetryPoint;

    fn dos() -> PhononDos {
        PhononDos::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]).unwrap()
    }

    fn bands(min: f64) -> BandStructure {
        BandStructure::new(
            vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
            vec![vec![0.0, min], vec![0.0, 4.0]],
            vec![HighSymmetryPoint {
                label: "Γ".to_string(),
                index: 0,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_formula_shape() {
        assert!(is_valid_formula("Si"));
        assert!(is_valid_formula("Ba(FeAs)2"));
        assert!(is_valid_formula("Li0.5CoO2"));
        assert!(!is_valid_formula(""));
        assert!(!is_valid_formula("si"));
        assert!(!is_valid_formula("Si-O"));
        assert!(!is_valid_formula("Si/O"));
    }

    #[test]
    fn test_material_id_validation() {
        assert!(validate_material_id("mp-149").is_ok());
        assert!(validate_material_id("").is_err());
        assert!(validate_material_id("mp/149").is_err());
        assert!(validate_material_id("mp 149").is_err());
        assert!(validate_material_id(".mp-149").is_err());
    }

    #[test]
    fn test_missing_capability_payload_rejected() {
        let result = PhononDocument::new("mp-149", "Si", Source::Pbe, Some(dos()), None);
        assert!(matches!(result, Err(EvalError::InvalidDocument(_))));

        let result = PhononDocument::new("mp-149", "Si", Source::Pbe, None, Some(bands(1.0)));
        assert!(matches!(result, Err(EvalError::InvalidDocument(_))));
    }

    #[test]
    fn test_derived_flags() {
        let doc = PhononDocument::new(
            "mp-149",
            "Si",
            Source::MaceMp,
            Some(dos()),
            Some(bands(-0.3)),
        )
        .unwrap();

        let flags = doc.derived_flags(0.01).unwrap();
        assert!(flags.has_imaginary_freq);
        assert!(!flags.has_imaginary_gamma_freq);
        assert_eq!(flags.tolerance, 0.01);

        let loose = doc.derived_flags(0.5).unwrap();
        assert!(!loose.has_imaginary_freq);
    }

    #[test]
    fn test_storage_key() {
        let doc =
            PhononDocument::new("mp-149", "Si", Source::Chgnet030, Some(dos()), Some(bands(1.0)))
                .unwrap();
        assert_eq!(
            doc.storage_key().relative_path().to_string_lossy(),
            "mp-149-Si/result-chgnet-v0.3.0.json.gz"
        );
    }

    #[test]
    fn test_json_round_trip_validates() {
        let doc = PhononDocument::new("mp-149", "Si", Source::Pbe, Some(dos()), Some(bands(1.0)))
            .unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let back: PhononDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);

        let tampered = json.replace("\"Si\"", "\"si\"");
        assert!(serde_json::from_str::<PhononDocument>(&tampered).is_err());
    }
}
