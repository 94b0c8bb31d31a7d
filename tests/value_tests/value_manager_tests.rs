//! Tests for ValueManager
//!
//! These tests verify:
//! - Lazy file creation on first use
//! - Pointer-based reads across several files
//! - Concurrent lookups of the same file share one handle

use std::sync::Arc;

use driftkv::files::value_file_name;
use driftkv::value::{ValueManager, ValuePointer};
use driftkv::DriftError;

#[path = "../common/mod.rs"]
mod common;

use common::setup_temp_dir;

#[test]
fn test_open_creates_directory_lazily_opens_files() {
    let (_temp, path) = setup_temp_dir();
    let dir = path.join("values");

    let manager = ValueManager::open(&dir).unwrap();

    assert!(dir.is_dir());
    assert!(manager.open_file_ids().is_empty());
    assert!(manager.existing_file_ids().unwrap().is_empty());
}

#[test]
fn test_write_and_read_across_files() {
    let (_temp, path) = setup_temp_dir();
    let manager = ValueManager::open(&path).unwrap();

    let a = manager.write(1, b"alpha").unwrap();
    let b = manager.write(2, b"bravo").unwrap();
    let c = manager.write(1, b"charlie").unwrap();

    assert_eq!(a, ValuePointer { file_id: 1, offset: 0, size: 5 });
    assert_eq!(b, ValuePointer { file_id: 2, offset: 0, size: 5 });
    assert_eq!(c.offset, a.stored_len());

    assert_eq!(manager.read(&a).unwrap(), b"alpha");
    assert_eq!(manager.read(&b).unwrap(), b"bravo");
    assert_eq!(manager.read(&c).unwrap(), b"charlie");

    assert_eq!(manager.open_file_ids(), vec![1, 2]);
    assert_eq!(manager.existing_file_ids().unwrap(), vec![1, 2]);
    manager.sync_all().unwrap();
}

#[test]
fn test_close_and_reopen() {
    let (_temp, path) = setup_temp_dir();
    let manager = ValueManager::open(&path).unwrap();

    let pointer = manager.write(9, b"persisted").unwrap();
    manager.sync_all().unwrap();

    assert!(manager.close(9));
    assert!(!manager.close(9));
    assert!(manager.open_file_ids().is_empty());

    // reopened on demand, resuming at the old length
    assert_eq!(manager.read(&pointer).unwrap(), b"persisted");
    let next = manager.write(9, b"more").unwrap();
    assert_eq!(next.offset, pointer.stored_len());
}

#[test]
fn test_read_of_unwritten_file_creates_nothing() {
    let (_temp, path) = setup_temp_dir();
    let manager = ValueManager::open(&path).unwrap();

    let pointer = ValuePointer { file_id: 9, offset: 0, size: 3 };
    match manager.read(&pointer) {
        Err(DriftError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected NotFound, got {:?}", other),
    }

    assert!(!path.join(value_file_name(9)).exists());
    assert!(manager.open_file_ids().is_empty());
    assert!(manager.existing_file_ids().unwrap().is_empty());
}

#[test]
fn test_corrupt_pointer_size_is_an_error() {
    let (_temp, path) = setup_temp_dir();
    let manager = ValueManager::open(&path).unwrap();
    let pointer = manager.write(1, b"small").unwrap();

    let bogus = ValuePointer { size: usize::MAX, ..pointer };
    assert!(matches!(manager.read(&bogus), Err(DriftError::IncompleteValue { .. })));
    assert_eq!(manager.read(&pointer).unwrap(), b"small");
}

#[test]
fn test_concurrent_lookup_shares_handle() {
    let (_temp, path) = setup_temp_dir();
    let manager = Arc::new(ValueManager::open(&path).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || manager.file(5).unwrap())
        })
        .collect();

    let files: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for file in &files[1..] {
        assert!(Arc::ptr_eq(&files[0], file));
    }
    assert_eq!(manager.open_file_ids(), vec![5]);
}

#[test]
fn test_concurrent_writes_to_different_files() {
    let (_temp, path) = setup_temp_dir();
    let manager = Arc::new(ValueManager::open(&path).unwrap());

    let handles: Vec<_> = (0..4u64)
        .map(|file_id| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                (0..100u32)
                    .map(|i| {
                        let value = format!("file {} value {}", file_id, i).into_bytes();
                        (manager.write(file_id, &value).unwrap(), value)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for (pointer, value) in handle.join().unwrap() {
            assert_eq!(manager.read(&pointer).unwrap(), value);
        }
    }
    assert_eq!(manager.open_file_ids(), vec![0, 1, 2, 3]);
}
