//! Shared fixtures for phbench-eval integration tests

#![allow(dead_code)]

use phbench_common::Source;
use phbench_eval::codec::write_document;
use phbench_eval::{
    BandStructure, FetchError, Fetcher, HighSymmetryPoint, PhononDocument, PhononDos,
};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

/// Five-point DOS with its last significant peak at 3 THz
pub fn sample_dos(scale: f64) -> PhononDos {
    PhononDos::new(
        vec![0.0, 1.0, 2.0, 3.0, 4.0],
        vec![0.0, scale, 0.5 * scale, 2.0 * scale, 0.0],
    )
    .unwrap()
}

/// Two-branch band structure along Γ-X
///
/// `gamma_min` is the lowest frequency at Γ, `path_min` the lowest one away
/// from it; both should stay below `max_freq`.
pub fn sample_bands(max_freq: f64, gamma_min: f64, path_min: f64) -> BandStructure {
    BandStructure::new(
        vec![[0.0, 0.0, 0.0], [0.25, 0.0, 0.0], [0.5, 0.0, 0.0]],
        vec![
            vec![gamma_min, path_min, 0.5 * max_freq],
            vec![0.0, 0.5 * max_freq, max_freq],
        ],
        vec![
            HighSymmetryPoint {
                label: "Γ".to_string(),
                index: 0,
            },
            HighSymmetryPoint {
                label: "X".to_string(),
                index: 2,
            },
        ],
    )
    .unwrap()
}

/// Document with full control over the band structure
pub fn phonon_doc(
    material_id: &str,
    formula: &str,
    source: Source,
    max_freq: f64,
    gamma_min: f64,
    path_min: f64,
) -> PhononDocument {
    PhononDocument::new(
        material_id,
        formula,
        source,
        Some(sample_dos(1.0)),
        Some(sample_bands(max_freq, gamma_min, path_min)),
    )
    .unwrap()
}

/// Stable document without imaginary modes
pub fn simple_doc(material_id: &str, formula: &str, source: Source) -> PhononDocument {
    phonon_doc(material_id, formula, source, 5.0, 0.0, 0.0)
}

/// Store a document where the cache and aggregator expect it
pub fn store(root: &Path, doc: &PhononDocument) -> PathBuf {
    let dir = root.join(format!("{}-{}", doc.material_id(), doc.formula()));
    fs::create_dir_all(&dir).unwrap();
    let path = root.join(doc.storage_key().relative_path());
    write_document(doc, &path).unwrap();
    path
}

/// Every file under `root`, relative, sorted
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Fetcher that serves one source and counts its calls
pub struct CountingFetcher {
    pub source: Source,
    pub formula: String,
    pub calls: Cell<usize>,
}

impl CountingFetcher {
    pub fn new(source: Source, formula: &str) -> Self {
        Self {
            source,
            formula: formula.to_string(),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Fetcher for CountingFetcher {
    fn fetch(&self, material_id: &str) -> Result<PhononDocument, FetchError> {
        self.calls.set(self.calls.get() + 1);
        Ok(simple_doc(material_id, &self.formula, self.source))
    }
}

/// Fetcher that always fails
pub struct FailingFetcher;

impl Fetcher for FailingFetcher {
    fn fetch(&self, material_id: &str) -> Result<PhononDocument, FetchError> {
        Err(FetchError::new(material_id, "mace-y7uhwpje", "model run diverged"))
    }
}
