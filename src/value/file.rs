//! Value File
//!
//! Append-only file of checksummed values. The only shared state is the
//! atomic end-of-file offset: a writer claims its range with one atomic add
//! and then writes without any lock.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use tracing::{debug, warn};

use crate::error::{DriftError, Result};
use crate::files::value_file_name;
use crate::io::PositionedIo;

use super::checksum::{Checksum, CHECKSUM_SIZE};

/// One append-only value file
pub struct ValueFile {
    /// Globally unique id, also encoded in the file name
    file_id: u64,

    path: Option<PathBuf>,

    /// Next free byte; bumped before the bytes are written
    offset: CachePadded<AtomicU64>,

    io: Box<dyn PositionedIo>,
}

impl ValueFile {
    /// Open or create the value file for `file_id` inside `dir`.
    ///
    /// The directory must already exist. Writing resumes at the current
    /// end of the file.
    pub fn open(dir: &Path, file_id: u64) -> Result<Self> {
        Self::open_with(dir, file_id, true)
    }

    /// Open the value file for `file_id` only if it is already on disk;
    /// a missing file is a `NotFound` I/O error.
    pub fn open_existing(dir: &Path, file_id: u64) -> Result<Self> {
        Self::open_with(dir, file_id, false)
    }

    fn open_with(dir: &Path, file_id: u64, create: bool) -> Result<Self> {
        let path = dir.join(value_file_name(file_id));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(&path)?;

        let mut value_file = Self::with_io(file_id, Box::new(file))?;
        debug!(
            file_id,
            offset = value_file.offset(),
            path = %path.display(),
            "Opened value file"
        );
        value_file.path = Some(path);
        Ok(value_file)
    }

    /// Build a value file over any positioned store
    pub fn with_io(file_id: u64, io: Box<dyn PositionedIo>) -> Result<Self> {
        let size = io.size()?;
        Ok(Self {
            file_id,
            path: None,
            offset: CachePadded::new(AtomicU64::new(size)),
            io,
        })
    }

    /// Append `value` with its checksum suffix, returning where it starts.
    ///
    /// The range is claimed before writing, so a failed write leaves a hole
    /// that no later write reuses.
    pub fn write(&self, value: &[u8]) -> Result<u64> {
        let size = (value.len() + CHECKSUM_SIZE) as u64;
        let offset = self.offset.fetch_add(size, Ordering::AcqRel);

        let checksum = Checksum::of(value)?;

        let mut record = Vec::with_capacity(size as usize);
        record.extend_from_slice(value);
        record.extend_from_slice(&checksum.to_be_bytes());

        let n = self.io.write_full_at(&record, offset)?;
        if n != record.len() {
            return Err(DriftError::IncompleteValue {
                expected: record.len(),
                actual: n,
            });
        }

        Ok(offset)
    }

    /// Read the `size`-byte value stored at `offset`, verifying its checksum
    ///
    /// A range running past the end of the file is an incomplete value; the
    /// buffer is never larger than what the file holds.
    pub fn read(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let available = self.io.size()?.saturating_sub(offset);
        let stored_len = match size.checked_add(CHECKSUM_SIZE) {
            Some(len) if len as u64 <= available => len,
            _ => {
                return Err(DriftError::IncompleteValue {
                    expected: size.saturating_add(CHECKSUM_SIZE),
                    actual: usize::try_from(available).unwrap_or(usize::MAX),
                })
            }
        };

        let mut record = vec![0u8; stored_len];
        let n = self.io.read_full_at(&mut record, offset)?;
        if n != record.len() {
            return Err(DriftError::IncompleteValue {
                expected: record.len(),
                actual: n,
            });
        }

        let mut stored = [0u8; CHECKSUM_SIZE];
        stored.copy_from_slice(&record[size..]);
        let expected = u32::from_be_bytes(stored);
        let actual = Checksum::of(&record[..size])?;

        if actual != expected {
            warn!(
                file_id = self.file_id,
                offset,
                size,
                "Value checksum mismatch"
            );
            return Err(DriftError::BadChecksum { expected, actual });
        }

        record.truncate(size);
        Ok(record)
    }

    /// Flush written values to durable storage (no-op without the capability)
    pub fn sync(&self) -> Result<()> {
        if let Some(durable) = self.io.durable() {
            durable.sync_data()?;
        }
        Ok(())
    }

    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// End of the claimed region; equals the file length once all
    /// in-flight writes finish
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ValueFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueFile")
            .field("file_id", &self.file_id)
            .field("path", &self.path)
            .field("offset", &self.offset())
            .finish()
    }
}
