//! Tests for WalManager
//!
//! These tests verify:
//! - Opening/creating the WAL directory
//! - Rotation when a segment is full (with one retry)
//! - Rotation once the logical size passes the limit
//! - Resuming the newest segment after restart
//! - Concurrent appends across rotations

use std::collections::BTreeSet;
use std::sync::Arc;

use driftkv::config::WalSyncStrategy;
use driftkv::files::wal_segment_file_name;
use driftkv::wal::{Transaction, WalManager};
use driftkv::{Config, DriftError};

#[path = "../common/mod.rs"]
mod common;

use common::{setup_temp_dir, small_config};

// =============================================================================
// Helper Functions
// =============================================================================

/// 16-byte header + 39-byte body = 55 bytes per record
fn tiny_txn(id: u64) -> Transaction {
    Transaction::new(id).delete(Vec::new())
}

const TINY_RECORD: u64 = 55;

/// Transaction ids stored in one segment, in header order
fn ids_in_segment(wal: &WalManager, segment_id: u64) -> Vec<u64> {
    let segment = if segment_id == wal.current_segment_id() {
        wal.current_segment()
    } else {
        Arc::new(wal.open_segment(segment_id).unwrap())
    };
    segment
        .headers()
        .unwrap()
        .iter()
        .map(|h| segment.read_transaction(h).unwrap().id)
        .collect()
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory_and_first_segment() {
    let (_temp, path) = setup_temp_dir();
    let config = Config::builder()
        .wal_dir(path.join("nested").join("wal"))
        .value_dir(path.join("values"))
        .build();

    let wal = WalManager::open(&config).unwrap();

    assert!(config.wal_dir.is_dir());
    assert_eq!(wal.current_segment_id(), 1);
    assert_eq!(wal.segment_ids().unwrap(), vec![1]);
    assert_eq!(wal.current_size(), 0);
    assert!(config.wal_dir.join(wal_segment_file_name(1)).is_file());
}

#[test]
fn test_open_rejects_invalid_config() {
    let (_temp, path) = setup_temp_dir();
    let config = Config::builder().data_dir(&path).wal_segment_capacity(8).build();
    assert!(matches!(WalManager::open(&config), Err(DriftError::Config(_))));
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_rotates_when_segment_is_full() {
    // 120 free bytes: two tiny records fit
    let (_temp, config) = small_config(128, 1 << 20);
    let wal = WalManager::open(&config).unwrap();

    assert_eq!(wal.append(&tiny_txn(1)).unwrap().segment_id, 1);
    assert_eq!(wal.append(&tiny_txn(2)).unwrap().segment_id, 1);

    let third = wal.append(&tiny_txn(3)).unwrap();
    assert_eq!(third.segment_id, 2);
    assert_eq!(wal.current_segment_id(), 2);
    assert_eq!(wal.current_size(), TINY_RECORD);

    assert_eq!(wal.segment_ids().unwrap(), vec![1, 2]);
    assert_eq!(ids_in_segment(&wal, 1), vec![1, 2]);
    assert_eq!(ids_in_segment(&wal, 2), vec![3]);
}

#[test]
fn test_rotates_after_size_limit_crossed() {
    let (_temp, config) = small_config(4096, 100);
    let wal = WalManager::open(&config).unwrap();

    assert_eq!(wal.append(&tiny_txn(1)).unwrap().segment_id, 1);
    assert_eq!(wal.current_size(), TINY_RECORD);

    // 110 > 100: this one still lands in segment 1
    assert_eq!(wal.append(&tiny_txn(2)).unwrap().segment_id, 1);
    assert_eq!(wal.current_segment_id(), 2);

    assert_eq!(wal.append(&tiny_txn(3)).unwrap().segment_id, 2);
    assert_eq!(ids_in_segment(&wal, 1), vec![1, 2]);
}

#[test]
fn test_failed_rotation_does_not_fail_append() {
    let (_temp, config) = small_config(4096, 100);
    let wal = WalManager::open(&config).unwrap();

    // a directory squatting on segment 2's name makes opening it fail
    let blocker = config.wal_dir.join(wal_segment_file_name(2));
    std::fs::create_dir(&blocker).unwrap();

    assert_eq!(wal.append(&tiny_txn(1)).unwrap().segment_id, 1);
    let crossing = wal.append(&tiny_txn(2)).unwrap();
    assert_eq!(crossing.segment_id, 1);
    assert_eq!(wal.current_segment_id(), 1);

    // the next append retries the rotation
    std::fs::remove_dir(&blocker).unwrap();
    assert_eq!(wal.append(&tiny_txn(3)).unwrap().segment_id, 1);
    assert_eq!(wal.current_segment_id(), 2);

    assert_eq!(ids_in_segment(&wal, 1), vec![1, 2, 3]);
}

#[test]
fn test_transaction_larger_than_segment() {
    let (_temp, config) = small_config(128, 1 << 20);
    let wal = WalManager::open(&config).unwrap();

    let huge = Transaction::new(1).set(b"k".to_vec(), vec![7u8; 512]);
    let err = wal.append(&huge).unwrap_err();
    assert!(err.is_insufficient_space());

    // the WAL stays usable
    let ok = wal.append(&tiny_txn(2)).unwrap();
    assert_eq!(ids_in_segment(&wal, ok.segment_id), vec![2]);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_resumes_newest_segment() {
    let (_temp, config) = small_config(128, 1 << 20);

    {
        let wal = WalManager::open(&config).unwrap();
        for id in 1..=5 {
            wal.append(&tiny_txn(id)).unwrap();
        }
        assert_eq!(wal.current_segment_id(), 3);
        wal.sync().unwrap();
    }

    let wal = WalManager::open(&config).unwrap();
    assert_eq!(wal.current_segment_id(), 3);
    assert_eq!(wal.current_size(), TINY_RECORD);
    assert_eq!(wal.segment_ids().unwrap(), vec![1, 2, 3]);

    wal.append(&tiny_txn(6)).unwrap();
    assert_eq!(ids_in_segment(&wal, 3), vec![5, 6]);
    assert_eq!(ids_in_segment(&wal, 1), vec![1, 2]);
}

#[test]
fn test_reopen_without_sync_keeps_records() {
    let (_temp, path) = setup_temp_dir();
    // default strategy: EveryNEntries { count: 100 }
    let config = Config::builder().data_dir(&path).build();

    {
        let wal = WalManager::open(&config).unwrap();
        wal.append(&tiny_txn(1)).unwrap();
        wal.append(&tiny_txn(2)).unwrap();
    }

    let wal = WalManager::open(&config).unwrap();
    assert_eq!(wal.current_size(), 2 * TINY_RECORD);
    assert_eq!(ids_in_segment(&wal, 1), vec![1, 2]);

    wal.append(&tiny_txn(3)).unwrap();
    assert_eq!(ids_in_segment(&wal, 1), vec![1, 2, 3]);
}

#[test]
fn test_open_segment_unknown_id() {
    let (_temp, config) = small_config(1024, 1 << 20);
    let wal = WalManager::open(&config).unwrap();

    match wal.open_segment(42) {
        Err(DriftError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert_eq!(wal.segment_ids().unwrap(), vec![1]);
}

#[test]
fn test_sync_strategies() {
    for strategy in [
        WalSyncStrategy::EveryWrite,
        WalSyncStrategy::EveryNEntries { count: 3 },
        WalSyncStrategy::Manual,
    ] {
        let (_temp, path) = setup_temp_dir();
        let config = Config::builder()
            .data_dir(&path)
            .wal_segment_capacity(4096)
            .wal_sync_strategy(strategy)
            .build();

        let wal = WalManager::open(&config).unwrap();
        for id in 1..=7 {
            wal.append(&tiny_txn(id)).unwrap();
        }
        wal.sync().unwrap();
        assert_eq!(ids_in_segment(&wal, 1), (1..=7).collect::<Vec<_>>());
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_appends_across_rotations() {
    let (_temp, config) = small_config(16 * 1024, 1 << 30);
    let wal = Arc::new(WalManager::open(&config).unwrap());
    let threads = 8u64;
    let per_thread = 100u64;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let wal = Arc::clone(&wal);
            std::thread::spawn(move || {
                (0..per_thread)
                    .map(|i| wal.append(&tiny_txn(t * per_thread + i + 1)).unwrap().segment_id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut used_segments = BTreeSet::new();
    for handle in handles {
        used_segments.extend(handle.join().unwrap());
    }

    // 800 * 55 bytes cannot fit one 16 KB segment
    assert!(used_segments.len() > 1);

    let mut all_ids = BTreeSet::new();
    for segment_id in wal.segment_ids().unwrap() {
        for id in ids_in_segment(&wal, segment_id) {
            assert!(all_ids.insert(id), "txn {} stored twice", id);
        }
    }
    assert_eq!(all_ids, (1..=threads * per_thread).collect());
}
