//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use driftkv::config::{Config, WalSyncStrategy};
use tempfile::TempDir;

/// Route `tracing` output through the test harness (RUST_LOG=driftkv=debug)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn setup_temp_dir() -> (TempDir, PathBuf) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

/// Config rooted in a fresh temp dir with small segments
pub fn small_config(capacity: u32, max_segment_size: u64) -> (TempDir, Config) {
    let (temp, path) = setup_temp_dir();
    let config = Config::builder()
        .data_dir(&path)
        .wal_segment_capacity(capacity)
        .max_wal_segment_size(max_segment_size)
        .wal_sync_strategy(WalSyncStrategy::Manual)
        .build();
    (temp, config)
}

/// Deterministic pseudo-random bytes (xorshift), so failures reproduce
pub fn pseudo_random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}
