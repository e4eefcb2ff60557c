//! Storage keys
//!
//! Every document lives at `{material_id}-{formula}/result-{source}.json.gz`
//! relative to the storage root. Formulas never contain `-`, so the directory
//! name is split at its last hyphen.

use phbench_common::Source;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{EvalError, EvalResult};
use crate::models::{is_valid_formula, validate_material_id};

/// File name prefix of a cached document
pub const FILE_PREFIX: &str = "result-";
/// File name suffix of a cached document
pub const FILE_SUFFIX: &str = ".json.gz";

/// Parsed location of one document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    material_id: String,
    formula: String,
    source: Source,
}

impl StorageKey {
    /// Create new key, validating material id and formula
    pub fn new(material_id: &str, formula: &str, source: Source) -> EvalResult<Self> {
        validate_material_id(material_id)
            .map_err(|e| EvalError::malformed(material_id, e.to_string()))?;
        if !is_valid_formula(formula) {
            return Err(EvalError::malformed(
                formula,
                "formula is not a reduced chemical formula",
            ));
        }
        Ok(Self::new_unchecked(material_id, formula, source))
    }

    /// Key for values already validated by [`PhononDocument`](crate::models::PhononDocument)
    pub(crate) fn new_unchecked(material_id: &str, formula: &str, source: Source) -> Self {
        Self {
            material_id: material_id.to_string(),
            formula: formula.to_string(),
            source,
        }
    }

    /// Parse a path relative to the storage root
    ///
    /// Shape errors are [`EvalError::MalformedKey`]; a well-formed key naming an
    /// unregistered source is [`EvalError::UnknownSource`].
    pub fn parse(relative: &Path) -> EvalResult<Self> {
        let display = relative.to_string_lossy().into_owned();

        let mut parts = Vec::with_capacity(2);
        for component in relative.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(s) => parts.push(s),
                    None => return Err(EvalError::malformed(display, "not valid UTF-8")),
                },
                _ => {
                    return Err(EvalError::malformed(
                        display,
                        "only plain relative components are allowed",
                    ))
                }
            }
        }

        let (dir_name, file_name) = match parts.as_slice() {
            [dir, file] => (*dir, *file),
            [_] => return Err(EvalError::malformed(display, "missing material directory")),
            _ => {
                return Err(EvalError::malformed(
                    display,
                    "expected {material_id}-{formula}/result-{source}.json.gz",
                ))
            }
        };

        let (material_id, formula) = split_dir_name(dir_name).ok_or_else(|| {
            EvalError::malformed(
                display.clone(),
                "directory is not {material_id}-{formula}",
            )
        })?;

        let tag = source_tag(file_name).ok_or_else(|| {
            EvalError::malformed(display.clone(), "file is not result-{source}.json.gz")
        })?;
        let source =
            Source::from_key(tag).ok_or_else(|| EvalError::UnknownSource(tag.to_string()))?;

        Ok(Self::new_unchecked(material_id, formula, source))
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

    /// `{material_id}-{formula}`
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.material_id, self.formula)
    }

    /// `result-{source}.json.gz`
    pub fn file_name(&self) -> String {
        file_name_for(self.source)
    }

    /// Path relative to the storage root
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.dir_name()).join(self.file_name())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dir_name(), self.file_name())
    }
}

/// `result-{source}.json.gz`
pub fn file_name_for(source: Source) -> String {
    format!("{}{}{}", FILE_PREFIX, source.key(), FILE_SUFFIX)
}

/// Split `{material_id}-{formula}` at the last hyphen
///
/// Returns `None` when either half is empty or malformed.
pub fn split_dir_name(dir_name: &str) -> Option<(&str, &str)> {
    let (material_id, formula) = dir_name.rsplit_once('-')?;
    if validate_material_id(material_id).is_err() || !is_valid_formula(formula) {
        return None;
    }
    Some((material_id, formula))
}

/// Source tag from `result-{tag}.json.gz`
fn source_tag(file_name: &str) -> Option<&str> {
    let tag = file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?;
    (!tag.is_empty()).then_some(tag)
}

/// Integer after the last `-` of a material id (`mp-149` -> 149)
pub fn numeric_suffix(material_id: &str) -> Option<u64> {
    let (_, suffix) = material_id.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}
