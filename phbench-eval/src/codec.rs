//! Gzip-compressed JSON encoding of phonon documents
//!
//! Encoding is reproducible: the gzip header carries no timestamp or file
//! name, so the same document always produces the same bytes.

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{EvalError, EvalResult};
use crate::models::PhononDocument;

/// Encode a document as gzip-compressed JSON
pub fn encode_document(doc: &PhononDocument) -> EvalResult<Vec<u8>> {
    let json = serde_json::to_vec(doc)?;

    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::with_capacity(json.len() / 4), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decode gzip-compressed JSON bytes into a validated document
///
/// A broken gzip stream and invalid JSON both surface as [`EvalError::Decode`].
pub fn decode_document(bytes: &[u8]) -> EvalResult<PhononDocument> {
    serde_json::from_reader(GzDecoder::new(bytes)).map_err(|e| EvalError::Decode {
        path: PathBuf::from("<memory>"),
        reason: e.to_string(),
    })
}

/// Read a document from disk
///
/// Side-effect free; safe to call from several threads at once.
pub fn read_document(path: &Path) -> EvalResult<PhononDocument> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    serde_json::from_reader(decoder).map_err(|e| EvalError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Hidden sibling used while a write is in progress
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write a document atomically (hidden temp file + rename)
///
/// Readers observe either the previous state or the complete new file. The
/// parent directory must already exist.
pub fn write_document(doc: &PhononDocument, path: &Path) -> EvalResult<()> {
    let bytes = encode_document(doc)?;
    let temp_path = temp_path_for(path);

    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(EvalError::Io(e));
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BandStructure, HighSymmetryPoint, PhononDos};
    use phbench_common::Source;
    use tempfile::TempDir;

    fn doc() -> PhononDocument {
        PhononDocument::new(
            "mp-149",
            "Si",
            Source::Pbe,
            Some(PhononDos::new(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap()),
            Some(
                BandStructure::new(
                    vec![[0.0, 0.0, 0.0]],
                    vec![vec![0.0]],
                    vec![HighSymmetryPoint {
                        label: "Γ".to_string(),
                        index: 0,
                    }],
                )
                .unwrap(),
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_encoding_is_reproducible() {
        let a = encode_document(&doc()).unwrap();
        let b = encode_document(&doc()).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..2], &[0x1f, 0x8b]);
        assert_eq!(decode_document(&a).unwrap(), doc());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result-pbe.json.gz");

        write_document(&doc(), &path).unwrap();

        assert_eq!(read_document(&path).unwrap(), doc());
        assert!(!temp_dir.path().join(".result-pbe.json.gz.tmp").exists());
    }

    #[test]
    fn test_write_into_missing_directory_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent").join("result-pbe.json.gz");

        assert!(write_document(&doc(), &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_corrupt_file_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result-pbe.json.gz");
        std::fs::write(&path, b"not gzip").unwrap();

        assert!(matches!(read_document(&path), Err(EvalError::Decode { .. })));
    }

    #[test]
    fn test_decode_corrupt_bytes_is_decode_error() {
        assert!(matches!(
            decode_document(b"not gzip"),
            Err(EvalError::Decode { .. })
        ));

        // Valid gzip around something that is not a document
        let mut encoder = GzBuilder::new().write(Vec::new(), Compression::default());
        encoder.write_all(b"{\"material_id\": 1}").unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(matches!(
            decode_document(&bytes),
            Err(EvalError::Decode { .. })
        ));
    }
}
