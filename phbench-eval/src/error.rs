//! Error types for phbench-eval
//!
//! Fatal conditions (malformed storage keys, unknown sources, inconsistent
//! documents, fetch failures during a required fetch) are errors. Coverage gaps
//! and undefined statistics are not: they show up as absent data and
//! [`MetricValue::Undefined`](crate::stats::MetricValue::Undefined) cells.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an external fetch collaborator
///
/// Produced by database clients or force-field runners. The cache passes it
/// through unchanged and never persists anything for the failed key.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Fetch failed for {material_id} ({source_tag}): {message}")]
pub struct FetchError {
    pub material_id: String,
    pub source_tag: String,
    pub message: String,
}

impl FetchError {
    pub fn new(
        material_id: impl Into<String>,
        source_tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            source_tag: source_tag.into(),
            message: message.into(),
        }
    }
}

/// Evaluation pipeline error
#[derive(Debug, Error)]
pub enum EvalError {
    /// External collaborator could not produce a document
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Storage entry does not parse into (material_id, formula, source)
    #[error("Malformed storage key {key:?}: {reason}")]
    MalformedKey { key: String, reason: String },

    /// Well-formed key naming a source missing from the registry
    #[error("Unknown source tag: {0}")]
    UnknownSource(String),

    /// Documents that contradict each other or their storage key
    #[error("Inconsistent document: {0}")]
    InconsistentDocument(String),

    /// Document payload failed validation
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Storage root missing or not a directory
    #[error("Storage root not usable: {0}")]
    StorageRoot(PathBuf),

    /// Cache entry could not be decoded
    #[error("Decode failed for {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delimited text export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Directory traversal error
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// phbench-common error
    #[error("Common error: {0}")]
    Common(#[from] phbench_common::Error),
}

impl EvalError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        EvalError::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;
