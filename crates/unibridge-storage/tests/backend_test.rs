//! Behavioural tests shared by every storage backend.

use std::sync::Arc;
use unibridge_core::storage::StorageBackend;
use unibridge_storage::{MemoryBackend, RedbBackend, RedbBackendConfig};

fn exercise(backend: &dyn StorageBackend) {
    assert_eq!(backend.read("groups", "1/1").unwrap(), None);

    backend.write("groups", "1/1", br#"{"device_group":7}"#).unwrap();
    backend.write("groups", "1/1", br#"{"device_group":8}"#).unwrap();
    assert_eq!(
        backend.read("groups", "1/1").unwrap(),
        Some(br#"{"device_group":8}"#.to_vec())
    );

    backend
        .write_batch(
            "groups",
            vec![("1/2".into(), b"b".to_vec()), ("2/1".into(), b"c".to_vec())],
        )
        .unwrap();
    assert_eq!(backend.scan("groups", "1/").unwrap().len(), 2);

    assert!(backend.delete("groups", "1/2").unwrap());
    assert!(!backend.delete("groups", "1/2").unwrap());
    assert_eq!(backend.scan("groups", "").unwrap().len(), 2);
}

#[test]
fn test_memory_backend_contract() {
    exercise(&MemoryBackend::new());
}

#[test]
fn test_redb_backend_contract() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RedbBackend::open(dir.path().join("contract.redb")).unwrap();
    exercise(&backend);
}

#[test]
fn test_redb_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.redb");

    {
        let backend = RedbBackend::open(&path).unwrap();
        assert!(backend.is_persistent());
        backend.write("group_allocator", "1", b"5").unwrap();
        backend.write("group_mappings", "1/5", b"{}").unwrap();
    }

    let backend: Arc<dyn StorageBackend> = Arc::new(
        RedbBackend::new(RedbBackendConfig::new(path.to_string_lossy()).with_cache_capacity(4))
            .unwrap(),
    );
    assert_eq!(
        backend.read("group_allocator", "1").unwrap(),
        Some(b"5".to_vec())
    );
    assert_eq!(backend.scan("group_mappings", "1/").unwrap().len(), 1);
}
