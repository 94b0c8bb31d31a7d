//! Configuration for DriftKV
//!
//! Centralized configuration with sensible defaults. Loading (files, env,
//! flags) belongs to the surrounding database; this module only describes
//! and validates the settings the storage core consumes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};
use crate::wal::{MAX_SEGMENT_CAPACITY, RECORD_HEADER_SIZE, SEGMENT_HEADER_SIZE};

/// Main configuration for the storage core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Directory holding WAL segment files
    pub wal_dir: PathBuf,

    /// Logical size after which the WAL manager moves on to a new segment.
    /// The transaction that crosses the limit still lands in the old one.
    pub max_wal_segment_size: u64,

    /// Fixed allocator capacity of every segment file (bytes)
    pub wal_segment_capacity: u32,

    /// Sync strategy: how often to fsync the active segment
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Value Configuration
    // -------------------------------------------------------------------------
    /// Directory holding value files
    pub value_dir: PathBuf,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalSyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends (balanced durability/performance)
    EveryNEntries { count: usize },

    /// Never fsync implicitly; the caller drives `sync()`
    Manual,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("./driftkv_data/wal"),
            max_wal_segment_size: 8 * 1024 * 1024,  // 8 MB
            wal_segment_capacity: 16 * 1024 * 1024, // 16 MB
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            value_dir: PathBuf::from("./driftkv_data/values"),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the storage core cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.wal_dir.as_os_str().is_empty() {
            return Err(DriftError::Config("wal_dir must not be empty".to_string()));
        }
        if self.value_dir.as_os_str().is_empty() {
            return Err(DriftError::Config("value_dir must not be empty".to_string()));
        }

        let min_capacity = SEGMENT_HEADER_SIZE + RECORD_HEADER_SIZE;
        if self.wal_segment_capacity <= min_capacity
            || self.wal_segment_capacity > MAX_SEGMENT_CAPACITY
        {
            return Err(DriftError::Config(format!(
                "wal_segment_capacity must be in ({}, {}], got {}",
                min_capacity,
                MAX_SEGMENT_CAPACITY,
                self.wal_segment_capacity
            )));
        }

        if self.max_wal_segment_size == 0 {
            return Err(DriftError::Config(
                "max_wal_segment_size must be greater than zero".to_string(),
            ));
        }

        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(DriftError::Config(
                "EveryNEntries sync strategy needs a count of at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Put both the WAL and value directories under one root
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let root: PathBuf = path.into();
        self.config.wal_dir = root.join("wal");
        self.config.value_dir = root.join("values");
        self
    }

    /// Set the WAL directory
    pub fn wal_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wal_dir = path.into();
        self
    }

    /// Set the value file directory
    pub fn value_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.value_dir = path.into();
        self
    }

    /// Set the logical size that triggers segment rotation (in bytes)
    pub fn max_wal_segment_size(mut self, size: u64) -> Self {
        self.config.max_wal_segment_size = size;
        self
    }

    /// Set the fixed capacity of each segment file (in bytes)
    pub fn wal_segment_capacity(mut self, capacity: u32) -> Self {
        self.config.wal_segment_capacity = capacity;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
