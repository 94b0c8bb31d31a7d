//! WAL Manager
//!
//! Owns the WAL directory and the active segment, and decides when to
//! move on to a new one.
//!
//! ## Responsibilities
//! - Discover existing segments on startup and resume the newest
//! - Route appends to the active segment
//! - Rotate on a full segment (retrying the append once) and after the
//!   logical size passes `max_wal_segment_size`
//! - Apply the configured sync strategy

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{Config, WalSyncStrategy};
use crate::error::Result;
use crate::files::{ensure_directory, list_files, wal_segment_file_name, FileType};

use super::segment::{RecordHeader, WalSegment};
use super::transaction::Transaction;
use super::RECORD_HEADER_SIZE;

/// Where an appended transaction landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    pub segment_id: u64,
    pub header: RecordHeader,
}

/// The active segment plus the size the manager has charged against it
struct ActiveSegment {
    segment: Arc<WalSegment>,
    logical_size: AtomicU64,
}

impl ActiveSegment {
    fn new(segment: WalSegment) -> Arc<Self> {
        let logical_size = AtomicU64::new(segment.logical_size());
        Arc::new(Self {
            segment: Arc::new(segment),
            logical_size,
        })
    }
}

/// Manages the segmented write-ahead log
///
/// ## Concurrency:
/// - `active`: RwLock held shared for the duration of a lookup only;
///   appends themselves run lock-free inside the segment
/// - rotation takes the lock exclusively and re-checks the segment id, so
///   racing appenders rotate at most once
pub struct WalManager {
    /// Directory where segments are stored
    dir: PathBuf,

    max_segment_size: u64,

    segment_capacity: u32,

    sync_strategy: WalSyncStrategy,

    active: RwLock<Arc<ActiveSegment>>,

    /// Appends since the last sync (EveryNEntries only)
    unsynced: AtomicUsize,
}

impl WalManager {
    /// Open or create the WAL described by `config`
    ///
    /// On startup:
    /// 1. Create the directory if it doesn't exist
    /// 2. Discover existing segment files
    /// 3. Resume the highest id, or create segment 1
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        ensure_directory(&config.wal_dir)?;

        let segment_ids = list_files(&config.wal_dir, FileType::Wal)?;
        let segment_id = segment_ids.last().copied().unwrap_or(1);

        let segment = WalSegment::open(&config.wal_dir, segment_id, config.wal_segment_capacity)?;
        info!(
            dir = %config.wal_dir.display(),
            segments = segment_ids.len(),
            active = segment_id,
            logical_size = segment.logical_size(),
            "Opened WAL"
        );

        Ok(Self {
            dir: config.wal_dir.clone(),
            max_segment_size: config.max_wal_segment_size,
            segment_capacity: config.wal_segment_capacity,
            sync_strategy: config.wal_sync_strategy,
            active: RwLock::new(ActiveSegment::new(segment)),
            unsynced: AtomicUsize::new(0),
        })
    }

    /// Append a transaction to the active segment.
    ///
    /// A full segment triggers one rotation and one retry; a transaction
    /// that does not fit an empty segment still fails with insufficient
    /// space. The append that pushes a segment past the size limit is kept
    /// there and the next append goes to a fresh segment; if that rotation
    /// fails the append still succeeds and later appends try again.
    pub fn append(&self, txn: &Transaction) -> Result<AppendResult> {
        let mut active = self.active.read().clone();

        let header = match active.segment.append(txn) {
            Ok(header) => header,
            Err(e) if e.is_insufficient_space() => {
                debug!(
                    segment_id = active.segment.id(),
                    txn_id = txn.id,
                    "WAL segment full, rotating"
                );
                active = self.rotate_from(active.segment.id())?;
                active.segment.append(txn)?
            }
            Err(e) => return Err(e),
        };

        // Rotated away while we were writing: the rotation's sync may have
        // run before this record was claimed or written.
        if self.current_segment_id() != active.segment.id() {
            active.segment.sync()?;
        }

        let record_len = RECORD_HEADER_SIZE as u64 + header.body_len() as u64;
        let logical_size = active.logical_size.fetch_add(record_len, Ordering::AcqRel) + record_len;

        self.apply_sync_strategy(&active.segment)?;

        // The record is already in the log; a failed rotation is retried by
        // the next append instead of failing this one.
        if logical_size > self.max_segment_size {
            if let Err(e) = self.rotate_from(active.segment.id()) {
                warn!(
                    segment_id = active.segment.id(),
                    logical_size,
                    error = %e,
                    "WAL rotation failed, staying on current segment"
                );
            }
        }

        Ok(AppendResult {
            segment_id: active.segment.id(),
            header,
        })
    }

    /// Force the active segment to durable storage
    pub fn sync(&self) -> Result<()> {
        let active = self.active.read().clone();
        active.segment.sync()?;
        self.unsynced.store(0, Ordering::Release);
        Ok(())
    }

    /// Id of the segment currently receiving appends
    pub fn current_segment_id(&self) -> u64 {
        self.active.read().segment.id()
    }

    /// The segment currently receiving appends
    pub fn current_segment(&self) -> Arc<WalSegment> {
        self.active.read().segment.clone()
    }

    /// Logical size charged against the active segment
    pub fn current_size(&self) -> u64 {
        self.active.read().logical_size.load(Ordering::Acquire)
    }

    /// Ids of every segment file in the directory, ascending
    pub fn segment_ids(&self) -> Result<Vec<u64>> {
        Ok(list_files(&self.dir, FileType::Wal)?)
    }

    /// Open an existing segment for reading (e.g. by a recovery pass).
    ///
    /// Never creates a file; an unknown id is a `NotFound` I/O error.
    pub fn open_segment(&self, segment_id: u64) -> Result<WalSegment> {
        let path = self.dir.join(wal_segment_file_name(segment_id));
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("WAL segment {} not found", segment_id),
            )
            .into());
        }
        WalSegment::open(&self.dir, segment_id, self.segment_capacity)
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Replace the active segment with `expected_id + 1`, unless another
    /// caller already moved past `expected_id`.
    fn rotate_from(&self, expected_id: u64) -> Result<Arc<ActiveSegment>> {
        let mut active = self.active.write();
        if active.segment.id() != expected_id {
            return Ok(active.clone());
        }

        active.segment.sync()?;
        self.unsynced.store(0, Ordering::Release);

        let next_id = expected_id + 1;
        let segment = WalSegment::open(&self.dir, next_id, self.segment_capacity)?;

        info!(
            old_segment = expected_id,
            new_segment = next_id,
            old_size = active.logical_size.load(Ordering::Acquire),
            "Rotated WAL segment"
        );

        *active = ActiveSegment::new(segment);
        Ok(active.clone())
    }

    fn apply_sync_strategy(&self, segment: &WalSegment) -> Result<()> {
        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => segment.sync(),
            WalSyncStrategy::EveryNEntries { count } => {
                let pending = self.unsynced.fetch_add(1, Ordering::AcqRel) + 1;
                if pending >= count {
                    self.unsynced.store(0, Ordering::Release);
                    segment.sync()?;
                }
                Ok(())
            }
            WalSyncStrategy::Manual => Ok(()),
        }
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("dir", &self.dir)
            .field("max_segment_size", &self.max_segment_size)
            .field("segment_capacity", &self.segment_capacity)
            .field("active", &self.current_segment_id())
            .finish()
    }
}
