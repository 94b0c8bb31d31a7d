//! WAL Segment
//!
//! One fixed-capacity file. The allocator word sits at offset 0, 16-byte
//! record headers grow forward from offset 8, and encoded transaction
//! bodies grow backward from the end of the file.
//!
//! ## Record Header (16 bytes, big-endian)
//! ```text
//! ┌───────────┬───────────┬─────────┐
//! │ TxnId (8) │ Start (4) │ End (4) │   body = file[start..end]
//! └───────────┴───────────┴─────────┘
//! ```

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{DriftError, Result};
use crate::files::wal_segment_file_name;
use crate::io::PositionedIo;

use super::allocator::{DualRegionAllocator, MAX_SEGMENT_CAPACITY};
use super::transaction::Transaction;
use super::{RECORD_HEADER_SIZE, SEGMENT_HEADER_SIZE};

/// Index entry pointing at one transaction body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub transaction_id: u64,
    /// First byte of the body
    pub start: u32,
    /// One past the last byte of the body
    pub end: u32,
}

impl RecordHeader {
    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE as usize] {
        let mut buf = [0u8; RECORD_HEADER_SIZE as usize];
        buf[0..8].copy_from_slice(&self.transaction_id.to_be_bytes());
        buf[8..12].copy_from_slice(&self.start.to_be_bytes());
        buf[12..16].copy_from_slice(&self.end.to_be_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_HEADER_SIZE as usize {
            return Err(DriftError::Decode(format!(
                "record header needs {} bytes, got {}",
                RECORD_HEADER_SIZE,
                data.len()
            )));
        }
        let mut id = [0u8; 8];
        let mut start = [0u8; 4];
        let mut end = [0u8; 4];
        id.copy_from_slice(&data[0..8]);
        start.copy_from_slice(&data[8..12]);
        end.copy_from_slice(&data[12..16]);

        Ok(Self {
            transaction_id: u64::from_be_bytes(id),
            start: u32::from_be_bytes(start),
            end: u32::from_be_bytes(end),
        })
    }

    /// Body length in bytes
    pub fn body_len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// A single fixed-capacity chunk of the WAL
///
/// ## Concurrency:
/// - `append`: lock-free, many callers at once; the allocator is the only
///   contended state
/// - the allocator word is rewritten after every append and on `sync`,
///   serialized by `word_lock`, which remembers the last persisted front so
///   an older snapshot never lands on disk after a newer one
pub struct WalSegment {
    /// Ascending id; higher means newer
    id: u64,

    /// Backing file path, when file-backed
    path: Option<PathBuf>,

    /// Bytes addressable by the allocator
    capacity: u32,

    io: Box<dyn PositionedIo>,

    allocator: DualRegionAllocator,

    /// Front cursor of the last word written to offset 0
    word_lock: Mutex<u32>,
}

impl WalSegment {
    /// Open or create the segment file for `segment_id` inside `dir`.
    ///
    /// A new (or never-initialized) file is sized to `capacity` and gets a
    /// fresh allocator; an existing one restores the allocator from its
    /// first 8 bytes.
    pub fn open(dir: &Path, segment_id: u64, capacity: u32) -> Result<Self> {
        let path = dir.join(wal_segment_file_name(segment_id));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        let mut segment = if len <= SEGMENT_HEADER_SIZE as u64 {
            // Word first: a crash before the resize leaves a file that still
            // counts as new.
            let sized = file.try_clone()?;
            let segment = Self::create(segment_id, Box::new(file), capacity)?;
            sized.set_len(capacity as u64)?;
            debug!(segment_id, capacity, path = %path.display(), "Created WAL segment");
            segment
        } else {
            let segment = Self::restore(segment_id, Box::new(file))?;
            debug!(
                segment_id,
                space = segment.space(),
                path = %path.display(),
                "Restored WAL segment"
            );
            segment
        };

        segment.path = Some(path);
        Ok(segment)
    }

    /// Build a segment over any positioned store
    pub fn with_io(segment_id: u64, io: Box<dyn PositionedIo>, capacity: u32) -> Result<Self> {
        if io.size()? <= SEGMENT_HEADER_SIZE as u64 {
            Self::create(segment_id, io, capacity)
        } else {
            Self::restore(segment_id, io)
        }
    }

    fn create(id: u64, io: Box<dyn PositionedIo>, capacity: u32) -> Result<Self> {
        check_capacity(id, capacity)?;
        let segment = Self {
            id,
            path: None,
            capacity,
            io,
            allocator: DualRegionAllocator::new(capacity),
            word_lock: Mutex::new(SEGMENT_HEADER_SIZE),
        };
        segment.write_exact(&segment.allocator.encode(), 0)?;
        Ok(segment)
    }

    fn restore(id: u64, io: Box<dyn PositionedIo>) -> Result<Self> {
        let size = io.size()?;
        let capacity = u32::try_from(size)
            .ok()
            .filter(|&capacity| capacity <= MAX_SEGMENT_CAPACITY)
            .ok_or_else(|| {
                DriftError::Decode(format!("segment {} is {} bytes, too large", id, size))
            })?;

        let mut word = [0u8; 8];
        let n = io.read_full_at(&mut word, 0)?;
        if n != word.len() {
            return Err(DriftError::IncompleteValue { expected: word.len(), actual: n });
        }
        // Sized but never initialized
        if word == [0u8; 8] {
            debug!(segment_id = id, capacity, "WAL segment has no allocator word, starting fresh");
            return Self::create(id, io, capacity);
        }

        let allocator = DualRegionAllocator::from_bytes(word);

        let (front, back) = allocator.current();
        if front < SEGMENT_HEADER_SIZE || back > capacity || front > back {
            return Err(DriftError::Decode(format!(
                "segment {} has a corrupt allocator word (front {}, back {}, capacity {})",
                id, front, back, capacity
            )));
        }

        Ok(Self {
            id,
            path: None,
            capacity,
            io,
            allocator,
            word_lock: Mutex::new(front),
        })
    }

    /// Append one transaction.
    ///
    /// Fails with [`DriftError::InsufficientSpace`] when the header and body
    /// no longer fit; the caller should rotate to a new segment. Once space
    /// is claimed it stays claimed, even if a write below fails.
    ///
    /// The on-disk allocator word covers the record before this returns, so
    /// a reopen finds it without an explicit `sync`.
    pub fn append(&self, txn: &Transaction) -> Result<RecordHeader> {
        let body = txn.encode()?;
        let requested = RECORD_HEADER_SIZE as u64 + body.len() as u64;

        let allocation = u32::try_from(body.len())
            .ok()
            .and_then(|len| self.allocator.allocate(RECORD_HEADER_SIZE, len))
            .ok_or_else(|| DriftError::InsufficientSpace {
                requested,
                available: self.allocator.space(),
            })?;

        let header = RecordHeader {
            transaction_id: txn.id,
            start: allocation.data_offset as u32,
            end: (allocation.data_offset + body.len() as u64) as u32,
        };

        self.write_exact(&body, allocation.data_offset)?;
        self.write_exact(&header.encode(), allocation.header_offset)?;
        self.persist_word()?;

        trace!(
            segment_id = self.id,
            txn_id = txn.id,
            header_offset = allocation.header_offset,
            start = header.start,
            end = header.end,
            "Appended transaction"
        );

        Ok(header)
    }

    /// Persist the allocator word and flush to durable storage.
    ///
    /// Without a durable capability on the store, only the word is written.
    pub fn sync(&self) -> Result<()> {
        {
            let mut persisted = self.word_lock.lock();
            let word = self.allocator.encode();
            self.write_exact(&word, 0)?;
            *persisted = (*persisted).max(word_front(word));
        }

        if let Some(durable) = self.io.durable() {
            durable.sync_data()?;
        }
        Ok(())
    }

    /// All record headers claimed so far, in claim order.
    ///
    /// A header whose write has not landed yet reads back as zeros; callers
    /// find out when `read_transaction` rejects it.
    pub fn headers(&self) -> Result<Vec<RecordHeader>> {
        let (front, _) = self.allocator.current();
        let len = (front - SEGMENT_HEADER_SIZE) as usize;

        let mut region = vec![0u8; len];
        let n = self.io.read_full_at(&mut region, SEGMENT_HEADER_SIZE as u64)?;
        if n != len {
            return Err(DriftError::IncompleteValue { expected: len, actual: n });
        }

        region
            .chunks_exact(RECORD_HEADER_SIZE as usize)
            .map(RecordHeader::decode)
            .collect()
    }

    /// Read back and decode the body a header points at
    pub fn read_transaction(&self, header: &RecordHeader) -> Result<Transaction> {
        let (_, back) = self.allocator.current();
        if header.start < back || header.end > self.capacity || header.start >= header.end {
            return Err(DriftError::Decode(format!(
                "record header for txn {} points outside the body region ({}..{})",
                header.transaction_id, header.start, header.end
            )));
        }

        let len = header.body_len() as usize;
        let mut body = vec![0u8; len];
        let n = self.io.read_full_at(&mut body, header.start as u64)?;
        if n != len {
            return Err(DriftError::IncompleteValue { expected: len, actual: n });
        }

        let txn = Transaction::decode(&body)?;
        if txn.id != header.transaction_id {
            return Err(DriftError::Decode(format!(
                "header names txn {}, body holds txn {}",
                header.transaction_id, txn.id
            )));
        }
        Ok(txn)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Racy count of unclaimed bytes
    pub fn space(&self) -> i64 {
        self.allocator.space()
    }

    /// Racy `(front, back)` cursor snapshot
    pub fn current(&self) -> (u32, u32) {
        self.allocator.current()
    }

    /// Bytes claimed by headers and bodies
    pub fn logical_size(&self) -> u64 {
        let (front, back) = self.allocator.current();
        (front - SEGMENT_HEADER_SIZE) as u64 + self.capacity.saturating_sub(back) as u64
    }

    /// Write the allocator word unless one at least as new is already on disk
    fn persist_word(&self) -> Result<()> {
        let mut persisted = self.word_lock.lock();
        let word = self.allocator.encode();
        let front = word_front(word);
        if front > *persisted {
            self.write_exact(&word, 0)?;
            *persisted = front;
        }
        Ok(())
    }

    fn write_exact(&self, buf: &[u8], offset: u64) -> Result<()> {
        let n = self.io.write_full_at(buf, offset)?;
        if n != buf.len() {
            return Err(DriftError::IncompleteWrite { expected: buf.len(), actual: n });
        }
        Ok(())
    }
}

fn check_capacity(id: u64, capacity: u32) -> Result<()> {
    let min_capacity = SEGMENT_HEADER_SIZE + RECORD_HEADER_SIZE;
    if capacity <= min_capacity || capacity > MAX_SEGMENT_CAPACITY {
        return Err(DriftError::Config(format!(
            "segment {} capacity must be in ({}, {}], got {}",
            id, min_capacity, MAX_SEGMENT_CAPACITY, capacity
        )));
    }
    Ok(())
}

fn word_front(word: [u8; 8]) -> u32 {
    u32::from_be_bytes([word[0], word[1], word[2], word[3]])
}

impl std::fmt::Debug for WalSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalSegment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("cursors", &self.allocator.current())
            .finish()
    }
}
