//! Result aggregation
//!
//! Scans a storage root and groups every stored document by material.
//!
//! Two-phase scan:
//! - Phase 1: sequential directory walk collecting `result-*` files
//! - Phase 2: parallel key parsing and decoding (rayon)
//!
//! Malformed keys abort the scan. Missing sources are simply absent from a
//! record; nothing is imputed.

use phbench_common::Source;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::cache::check_matches;
use crate::codec::read_document;
use crate::error::{EvalError, EvalResult};
use crate::key::{StorageKey, FILE_PREFIX};
use crate::models::PhononDocument;

// ============================================================================
// Material records
// ============================================================================

/// All documents available for one material
#[derive(Debug, Clone)]
pub struct MaterialRecord {
    material_id: String,
    formula: String,
    documents: BTreeMap<Source, Arc<PhononDocument>>,
}

impl MaterialRecord {
    fn new(material_id: &str, formula: &str) -> Self {
        Self {
            material_id: material_id.to_string(),
            formula: formula.to_string(),
            documents: BTreeMap::new(),
        }
    }

    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Documents keyed by source, in registry order
    pub fn documents(&self) -> &BTreeMap<Source, Arc<PhononDocument>> {
        &self.documents
    }

    pub fn get(&self, source: Source) -> Option<&Arc<PhononDocument>> {
        self.documents.get(&source)
    }

    /// Reference document, if the reference source is present
    pub fn reference(&self) -> Option<&Arc<PhononDocument>> {
        self.get(Source::reference())
    }

    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.documents.keys().copied()
    }

    /// Number of sources present
    pub fn coverage(&self) -> usize {
        self.documents.len()
    }
}

/// Material records keyed by material id
#[derive(Debug, Clone, Default)]
pub struct MaterialIndex {
    records: BTreeMap<String, MaterialRecord>,
}

impl MaterialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from documents already in memory
    pub fn from_documents<I>(docs: I) -> EvalResult<Self>
    where
        I: IntoIterator<Item = Arc<PhononDocument>>,
    {
        let mut index = Self::new();
        for doc in docs {
            index.insert(doc)?;
        }
        Ok(index)
    }

    /// Add a document to its material record
    ///
    /// A formula that disagrees with the record, or a second document for the
    /// same source, is an inconsistency.
    pub fn insert(&mut self, doc: Arc<PhononDocument>) -> EvalResult<()> {
        let record = self
            .records
            .entry(doc.material_id().to_string())
            .or_insert_with(|| MaterialRecord::new(doc.material_id(), doc.formula()));

        if record.formula != doc.formula() {
            return Err(EvalError::InconsistentDocument(format!(
                "{} has formula {} but {} reports {}",
                record.material_id,
                record.formula,
                doc.source(),
                doc.formula()
            )));
        }
        if record.documents.contains_key(&doc.source()) {
            return Err(EvalError::InconsistentDocument(format!(
                "{} has two {} documents",
                record.material_id,
                doc.source()
            )));
        }

        record.documents.insert(doc.source(), doc);
        Ok(())
    }

    pub fn get(&self, material_id: &str) -> Option<&MaterialRecord> {
        self.records.get(material_id)
    }

    /// Records in material-id order
    pub fn iter(&self) -> impl Iterator<Item = &MaterialRecord> {
        self.records.values()
    }

    /// Number of materials
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of documents across all materials
    pub fn document_count(&self) -> usize {
        self.records.values().map(MaterialRecord::coverage).sum()
    }

    /// Records with exactly `k` sources
    pub fn with_coverage(&self, k: usize) -> Vec<&MaterialRecord> {
        self.iter().filter(|r| r.coverage() == k).collect()
    }

    /// Records with at least `k` sources
    pub fn with_min_coverage(&self, k: usize) -> Vec<&MaterialRecord> {
        self.iter().filter(|r| r.coverage() >= k).collect()
    }

    /// Material count per coverage level
    pub fn coverage_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for record in self.iter() {
            *counts.entry(record.coverage()).or_insert(0) += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a MaterialIndex {
    type Item = &'a MaterialRecord;
    type IntoIter = std::collections::btree_map::Values<'a, String, MaterialRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Builds a [`MaterialIndex`] from a storage root
pub struct Aggregator {
    root: PathBuf,
}

impl Aggregator {
    /// Create new aggregator over `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scan the root and group documents by material
    pub fn scan(&self) -> EvalResult<MaterialIndex> {
        if !self.root.is_dir() {
            return Err(EvalError::StorageRoot(self.root.clone()));
        }

        // Phase 1: sequential traversal
        let mut candidates = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && is_result_file(&entry) {
                candidates.push(entry.into_path());
            }
        }

        debug!(
            "Phase 1 complete: {} candidate files under {}",
            candidates.len(),
            self.root.display()
        );

        // Phase 2: parallel parse + decode
        let mut loaded: Vec<(StorageKey, PhononDocument)> = candidates
            .par_iter()
            .map(|path| self.load(path))
            .collect::<EvalResult<_>>()?;

        debug!("Phase 2 complete: {} documents decoded", loaded.len());

        // Phase 3: deterministic insertion
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        let mut index = MaterialIndex::new();
        for (_, doc) in loaded {
            index.insert(Arc::new(doc))?;
        }

        info!(
            materials = index.len(),
            documents = index.document_count(),
            root = %self.root.display(),
            "Aggregated stored documents"
        );
        Ok(index)
    }

    fn load(&self, path: &Path) -> EvalResult<(StorageKey, PhononDocument)> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let key = StorageKey::parse(relative)?;
        let doc = read_document(path)?;
        check_matches(&doc, key.material_id(), key.formula(), key.source(), path)?;
        Ok((key, doc))
    }
}

/// Dot-prefixed entries below the root (in-progress writes, editor files)
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn is_result_file(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with(FILE_PREFIX))
        .unwrap_or(false)
}
