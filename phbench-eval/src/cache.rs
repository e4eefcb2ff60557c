//! Persistent document cache
//!
//! Memoizes the expensive production of phonon documents (database downloads,
//! force-field runs) on disk:
//! - Hit: decode the stored document, never call the fetcher
//! - Miss: call the fetcher, store atomically, return the document
//! - Disabled root: every call fetches; nothing is read or written
//!
//! Fetch failures leave neither a file nor a directory behind, so re-running
//! after a failure fetches exactly the missing keys.

use phbench_common::Source;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::{read_document, write_document};
use crate::error::{EvalError, EvalResult, FetchError};
use crate::key::{file_name_for, split_dir_name};
use crate::models::PhononDocument;

// ============================================================================
// Storage root
// ============================================================================

/// Where cached documents live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRoot {
    /// Persistence switched off
    Disabled,
    /// Directory holding `{material_id}-{formula}/` subdirectories
    Dir(PathBuf),
}

impl StorageRoot {
    /// An empty string disables persistence
    pub fn from_path_str(value: &str) -> Self {
        if value.is_empty() {
            StorageRoot::Disabled
        } else {
            StorageRoot::Dir(PathBuf::from(value))
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageRoot::Disabled => None,
            StorageRoot::Dir(path) => Some(path),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, StorageRoot::Dir(_))
    }
}

// ============================================================================
// Fetch boundary
// ============================================================================

/// Produces a document for a material when the cache has none
///
/// Database clients and force-field runners sit behind this trait. A fetcher
/// serves exactly one source.
pub trait Fetcher {
    fn fetch(&self, material_id: &str) -> Result<PhononDocument, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<PhononDocument, FetchError>,
{
    fn fetch(&self, material_id: &str) -> Result<PhononDocument, FetchError> {
        self(material_id)
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Counters for one cache instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls to a fetcher
    pub fetches: usize,
    /// Documents decoded from disk
    pub disk_hits: usize,
    /// Documents served from the in-process memo
    pub memory_hits: usize,
}

/// Per-(material, source) document cache
///
/// With persistence enabled, each key is fetched at most once per run: every
/// loaded or fetched document is also kept in memory.
pub struct DocumentCache {
    root: StorageRoot,
    memo: HashMap<(String, Source), Arc<PhononDocument>>,
    stats: CacheStats,
}

impl DocumentCache {
    /// Create new cache over `root`
    pub fn new(root: StorageRoot) -> Self {
        match &root {
            StorageRoot::Disabled => info!("Document cache disabled: every lookup fetches"),
            StorageRoot::Dir(path) => info!(root = %path.display(), "Document cache enabled"),
        }
        Self {
            root,
            memo: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Return the document for (material_id, source), fetching on a miss
    pub fn get_or_fetch<F: Fetcher + ?Sized>(
        &mut self,
        material_id: &str,
        source: Source,
        fetcher: &F,
    ) -> EvalResult<Arc<PhononDocument>> {
        let Some(root) = self.root.path().map(Path::to_path_buf) else {
            let doc = self.fetch_checked(material_id, source, fetcher)?;
            return Ok(Arc::new(doc));
        };

        let memo_key = (material_id.to_string(), source);
        if let Some(doc) = self.memo.get(&memo_key) {
            self.stats.memory_hits += 1;
            debug!(material_id, source = %source, "Memory hit");
            return Ok(Arc::clone(doc));
        }

        let doc = match find_cached(&root, material_id, source)? {
            Some((path, formula)) => {
                let doc = read_document(&path)?;
                check_matches(&doc, material_id, &formula, source, &path)?;
                self.stats.disk_hits += 1;
                debug!(material_id, source = %source, path = %path.display(), "Disk hit");
                doc
            }
            None => {
                let doc = self.fetch_checked(material_id, source, fetcher)?;
                let dir = root.join(format!("{}-{}", doc.material_id(), doc.formula()));
                write_in_dir(&dir, |dir| write_document(&doc, &dir.join(file_name_for(source))))?;
                doc
            }
        };

        let doc = Arc::new(doc);
        self.memo.insert(memo_key, Arc::clone(&doc));
        debug!(
            fetches = self.stats.fetches,
            disk_hits = self.stats.disk_hits,
            memory_hits = self.stats.memory_hits,
            "Cache stats"
        );
        Ok(doc)
    }

    /// Call the fetcher and check that it answered the question asked
    fn fetch_checked<F: Fetcher + ?Sized>(
        &mut self,
        material_id: &str,
        source: Source,
        fetcher: &F,
    ) -> EvalResult<PhononDocument> {
        self.stats.fetches += 1;
        debug!(material_id, source = %source, "Fetching document");

        let doc = fetcher.fetch(material_id).map_err(|e| {
            warn!(material_id, source = %source, error = %e, "Fetch failed");
            EvalError::Fetch(e)
        })?;

        if doc.material_id() != material_id || doc.source() != source {
            return Err(EvalError::InconsistentDocument(format!(
                "requested {} ({}), fetcher returned {} ({})",
                material_id,
                source,
                doc.material_id(),
                doc.source()
            )));
        }
        Ok(doc)
    }
}

/// Locate `{root}/{material_id}-{formula}/result-{source}.json.gz`
///
/// The formula is only known once a document exists, so the root is scanned
/// for directories belonging to `material_id`. Two matches for one key is an
/// inconsistency.
/// Run `write` inside `dir`, creating the directory first if needed
///
/// When `write` fails, a directory created here is removed again.
fn write_in_dir<W>(dir: &Path, write: W) -> EvalResult<()>
where
    W: FnOnce(&Path) -> EvalResult<()>,
{
    let created = !dir.is_dir();
    fs::create_dir_all(dir)?;

    if let Err(e) = write(dir) {
        if created {
            if let Err(cleanup) = fs::remove_dir(dir) {
                warn!(dir = %dir.display(), error = %cleanup, "Failed to remove directory");
            }
        }
        return Err(e);
    }
    Ok(())
}

fn find_cached(
    root: &Path,
    material_id: &str,
    source: Source,
) -> EvalResult<Option<(PathBuf, String)>> {
    if !root.is_dir() {
        return Ok(None);
    }

    let file_name = file_name_for(source);
    let mut found: Option<(PathBuf, String)> = None;

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir_name = entry.file_name();
        let Some(dir_name) = dir_name.to_str() else {
            continue;
        };
        let Some((id, formula)) = split_dir_name(dir_name) else {
            continue;
        };
        if id != material_id {
            continue;
        }

        let candidate = entry.path().join(&file_name);
        if !candidate.is_file() {
            continue;
        }
        if let Some((existing, _)) = &found {
            return Err(EvalError::InconsistentDocument(format!(
                "{} ({}) stored twice: {} and {}",
                material_id,
                source,
                existing.display(),
                candidate.display()
            )));
        }
        found = Some((candidate, formula.to_string()));
    }

    Ok(found)
}

/// A stored document must agree with the key it was stored under
pub(crate) fn check_matches(
    doc: &PhononDocument,
    material_id: &str,
    formula: &str,
    source: Source,
    path: &Path,
) -> EvalResult<()> {
    if doc.material_id() != material_id || doc.formula() != formula || doc.source() != source {
        return Err(EvalError::InconsistentDocument(format!(
            "{} holds {}-{} ({})",
            path.display(),
            doc.material_id(),
            doc.formula(),
            doc.source()
        )));
    }
    Ok(())
}
