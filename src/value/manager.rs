//! Value Manager
//!
//! Owns every open value file, keyed by file id.
//!
//! ## Responsibilities
//! - Open value files lazily on first use
//! - Route reads and writes to the right file
//! - Sync and close files on behalf of the surrounding database

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::files::{ensure_directory, list_files, FileType};

use super::file::ValueFile;
use super::ValuePointer;

/// Manages the set of open value files
///
/// ## Concurrency:
/// - `files`: RwLock guards only map structure. Lookups share it, a miss
///   takes it exclusively and re-checks before opening
/// - I/O happens outside the lock on the returned `Arc<ValueFile>`, so work
///   on one file never waits on another
pub struct ValueManager {
    /// Directory where value files are stored
    dir: PathBuf,

    files: RwLock<HashMap<u64, Arc<ValueFile>>>,
}

impl ValueManager {
    /// Create the directory if needed; no files are opened eagerly
    pub fn open(dir: &Path) -> Result<Self> {
        ensure_directory(dir)?;
        info!(dir = %dir.display(), "Opened value store");

        Ok(Self {
            dir: dir.to_path_buf(),
            files: RwLock::new(HashMap::new()),
        })
    }

    /// Get the open file for `file_id`, opening (or creating) it on a miss
    pub fn file(&self, file_id: u64) -> Result<Arc<ValueFile>> {
        self.lookup(file_id, true)
    }

    /// Get the file for `file_id` without creating it; a file that was never
    /// written is a `NotFound` I/O error.
    pub fn existing_file(&self, file_id: u64) -> Result<Arc<ValueFile>> {
        self.lookup(file_id, false)
    }

    /// Append `value` to file `file_id`
    pub fn write(&self, file_id: u64, value: &[u8]) -> Result<ValuePointer> {
        let offset = self.file(file_id)?.write(value)?;
        Ok(ValuePointer {
            file_id,
            offset,
            size: value.len(),
        })
    }

    /// Read the value a pointer refers to
    pub fn read(&self, pointer: &ValuePointer) -> Result<Vec<u8>> {
        self.existing_file(pointer.file_id)?
            .read(pointer.offset, pointer.size)
    }

    /// Sync every open file
    pub fn sync_all(&self) -> Result<()> {
        let files: Vec<Arc<ValueFile>> = self.files.read().values().cloned().collect();
        for file in files {
            file.sync()?;
        }
        Ok(())
    }

    /// Drop the handle for `file_id`; returns whether it was open.
    ///
    /// Callers still holding the `Arc` keep a usable handle until they drop it.
    pub fn close(&self, file_id: u64) -> bool {
        self.files.write().remove(&file_id).is_some()
    }

    /// Ids of currently open files, ascending
    pub fn open_file_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.files.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of value files present on disk, ascending
    pub fn existing_file_ids(&self) -> Result<Vec<u64>> {
        Ok(list_files(&self.dir, FileType::Value)?)
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn lookup(&self, file_id: u64, create: bool) -> Result<Arc<ValueFile>> {
        if let Some(file) = self.files.read().get(&file_id) {
            return Ok(file.clone());
        }

        let mut files = self.files.write();

        // Another caller may have opened it between the two locks
        if let Some(file) = files.get(&file_id) {
            return Ok(file.clone());
        }

        let file = if create {
            ValueFile::open(&self.dir, file_id)?
        } else {
            ValueFile::open_existing(&self.dir, file_id)?
        };
        let file = Arc::new(file);
        files.insert(file_id, file.clone());
        debug!(file_id, open_files = files.len(), "Registered value file");

        Ok(file)
    }
}

impl std::fmt::Debug for ValueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueManager")
            .field("dir", &self.dir)
            .field("open_files", &self.open_file_ids())
            .finish()
    }
}
