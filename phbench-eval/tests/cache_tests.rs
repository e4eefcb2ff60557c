//! Integration tests for the persistent document cache
//!
//! Tests cover:
//! - Idempotence: one fetch per key, byte-identical entries
//! - Disabled persistence fetches every time and writes nothing
//! - Fetch failures leave no entry behind
//! - Inconsistent fetcher answers and duplicate entries are rejected

mod common;

use common::{list_files, simple_doc, store, CountingFetcher, FailingFetcher};
use phbench_common::Source;
use phbench_eval::codec::encode_document;
use phbench_eval::{
    CacheStats, DocumentCache, EvalError, FetchError, PhononDocument, StorageRoot,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn enabled(temp_dir: &TempDir) -> DocumentCache {
    DocumentCache::new(StorageRoot::Dir(temp_dir.path().to_path_buf()))
}

#[test]
fn test_second_lookup_does_not_fetch() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = CountingFetcher::new(Source::MaceMp, "Si");
    let mut cache = enabled(&temp_dir);

    let first = cache.get_or_fetch("mp-149", Source::MaceMp, &fetcher).unwrap();
    let second = cache.get_or_fetch("mp-149", Source::MaceMp, &fetcher).unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(
        cache.stats(),
        CacheStats {
            fetches: 1,
            disk_hits: 0,
            memory_hits: 1
        }
    );
}

#[test]
fn test_entry_survives_across_cache_instances() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = CountingFetcher::new(Source::Chgnet030, "NaCl");

    let first = enabled(&temp_dir)
        .get_or_fetch("mp-22862", Source::Chgnet030, &fetcher)
        .unwrap();
    let path = temp_dir
        .path()
        .join("mp-22862-NaCl")
        .join("result-chgnet-v0.3.0.json.gz");
    let bytes_after_first = fs::read(&path).unwrap();

    let mut reopened = enabled(&temp_dir);
    let second = reopened
        .get_or_fetch("mp-22862", Source::Chgnet030, &fetcher)
        .unwrap();
    let bytes_after_second = fs::read(&path).unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(bytes_after_first, bytes_after_second);
    assert_eq!(bytes_after_first, encode_document(&first).unwrap());
    assert_eq!(reopened.stats().disk_hits, 1);
}

#[test]
fn test_miss_writes_single_entry_without_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = CountingFetcher::new(Source::Pbe, "Si");

    enabled(&temp_dir)
        .get_or_fetch("mp-149", Source::Pbe, &fetcher)
        .unwrap();

    assert_eq!(
        list_files(temp_dir.path()),
        vec![PathBuf::from("mp-149-Si/result-pbe.json.gz")]
    );
}

#[test]
fn test_sources_of_one_material_share_a_directory() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = enabled(&temp_dir);

    cache
        .get_or_fetch("mp-149", Source::Pbe, &CountingFetcher::new(Source::Pbe, "Si"))
        .unwrap();
    cache
        .get_or_fetch("mp-149", Source::Gnome, &CountingFetcher::new(Source::Gnome, "Si"))
        .unwrap();

    assert_eq!(
        list_files(temp_dir.path()),
        vec![
            PathBuf::from("mp-149-Si/result-gnome.json.gz"),
            PathBuf::from("mp-149-Si/result-pbe.json.gz"),
        ]
    );
}

#[test]
fn test_disabled_cache_fetches_every_time() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = CountingFetcher::new(Source::MaceMp, "Si");
    let mut cache = DocumentCache::new(StorageRoot::from_path_str(""));

    let first = cache.get_or_fetch("mp-149", Source::MaceMp, &fetcher).unwrap();
    let second = cache.get_or_fetch("mp-149", Source::MaceMp, &fetcher).unwrap();

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(first, second);
    assert_eq!(cache.stats().memory_hits, 0);
    assert_eq!(cache.stats().disk_hits, 0);
    assert!(list_files(temp_dir.path()).is_empty());
}

#[test]
fn test_fetch_failure_leaves_no_entry() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = enabled(&temp_dir);

    let err = cache
        .get_or_fetch("mp-149", Source::MaceMp, &FailingFetcher)
        .unwrap_err();

    match err {
        EvalError::Fetch(FetchError { material_id, message, .. }) => {
            assert_eq!(material_id, "mp-149");
            assert_eq!(message, "model run diverged");
        }
        other => panic!("expected fetch error, got {:?}", other),
    }
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);

    // A later successful fetch fills the gap
    let fetcher = CountingFetcher::new(Source::MaceMp, "Si");
    cache.get_or_fetch("mp-149", Source::MaceMp, &fetcher).unwrap();
    assert_eq!(fetcher.calls(), 1);
}

#[test]
fn test_closure_fetcher() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = enabled(&temp_dir);
    let fetcher = |id: &str| -> Result<PhononDocument, FetchError> {
        Ok(simple_doc(id, "GaAs", Source::Gnome))
    };

    let doc = cache.get_or_fetch("mp-2534", Source::Gnome, &fetcher).unwrap();

    assert_eq!(doc.formula(), "GaAs");
    assert!(temp_dir
        .path()
        .join("mp-2534-GaAs/result-gnome.json.gz")
        .is_file());
}

#[test]
fn test_fetcher_returning_wrong_material_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = enabled(&temp_dir);
    let fetcher = |_: &str| -> Result<PhononDocument, FetchError> {
        Ok(simple_doc("mp-1", "Si", Source::MaceMp))
    };

    let err = cache.get_or_fetch("mp-149", Source::MaceMp, &fetcher).unwrap_err();

    assert!(matches!(err, EvalError::InconsistentDocument(_)));
    assert!(list_files(temp_dir.path()).is_empty());
}

#[test]
fn test_fetcher_returning_wrong_source_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut cache = enabled(&temp_dir);
    let fetcher = CountingFetcher::new(Source::Pbe, "Si");

    let err = cache.get_or_fetch("mp-149", Source::MaceMp, &fetcher).unwrap_err();

    assert!(matches!(err, EvalError::InconsistentDocument(_)));
}

#[test]
fn test_preexisting_entry_is_a_hit() {
    let temp_dir = TempDir::new().unwrap();
    let stored = simple_doc("mp-149", "Si", Source::M3gnetMs);
    store(temp_dir.path(), &stored);
    let fetcher = CountingFetcher::new(Source::M3gnetMs, "Si");

    let doc = enabled(&temp_dir)
        .get_or_fetch("mp-149", Source::M3gnetMs, &fetcher)
        .unwrap();

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(*doc, stored);
}

#[test]
fn test_prefix_sharing_ids_do_not_collide() {
    let temp_dir = TempDir::new().unwrap();
    store(temp_dir.path(), &simple_doc("mp-1", "Si", Source::Pbe));
    let fetcher = CountingFetcher::new(Source::Pbe, "Ge");

    // "mp-14-Si" must not be mistaken for an entry of "mp-1"
    store(temp_dir.path(), &simple_doc("mp-14", "Si", Source::Pbe));
    let doc = enabled(&temp_dir)
        .get_or_fetch("mp-1", Source::Pbe, &fetcher)
        .unwrap();

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(doc.material_id(), "mp-1");
}

#[test]
fn test_duplicate_entries_for_one_key_are_inconsistent() {
    let temp_dir = TempDir::new().unwrap();
    store(temp_dir.path(), &simple_doc("mp-149", "Si", Source::Pbe));
    store(temp_dir.path(), &simple_doc("mp-149", "Ge", Source::Pbe));
    let fetcher = CountingFetcher::new(Source::Pbe, "Si");

    let err = enabled(&temp_dir)
        .get_or_fetch("mp-149", Source::Pbe, &fetcher)
        .unwrap_err();

    assert!(matches!(err, EvalError::InconsistentDocument(_)));
    assert_eq!(fetcher.calls(), 0);
}

#[test]
fn test_corrupt_entry_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("mp-149-Si");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("result-pbe.json.gz"), b"garbage").unwrap();
    let fetcher = CountingFetcher::new(Source::Pbe, "Si");

    let err = enabled(&temp_dir)
        .get_or_fetch("mp-149", Source::Pbe, &fetcher)
        .unwrap_err();

    assert!(matches!(err, EvalError::Decode { .. }));
    assert_eq!(fetcher.calls(), 0);
}

#[test]
fn test_missing_root_is_created_on_first_write() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("cache").join("phonons");
    let mut cache = DocumentCache::new(StorageRoot::Dir(root.clone()));

    cache
        .get_or_fetch("mp-149", Source::Pbe, &CountingFetcher::new(Source::Pbe, "Si"))
        .unwrap();

    assert!(root.join("mp-149-Si/result-pbe.json.gz").is_file());
}
