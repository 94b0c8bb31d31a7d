//! Value Store Module
//!
//! Large values live outside the key files, in append-only value files.
//!
//! ## Responsibilities
//! - Concurrent appends with a single atomic offset per file
//! - Checksum every value; refuse to serve a value that fails it
//! - Lazy, thread-safe file lookup by id
//!
//! ## File Format
//! ```text
//! ┌──────────────────┬─────────────┬──────────────────┬─────────────┐
//! │ Value 1 (n bytes)│ CRC32 (4,BE)│ Value 2 (m bytes)│ CRC32 (4,BE)│ ...
//! └──────────────────┴─────────────┴──────────────────┴─────────────┘
//! ```
//! No padding between records; a value is addressed by (file, offset, size).

mod checksum;
mod file;
mod manager;

pub use checksum::{Checksum, CHECKSUM_SIZE};
pub use file::ValueFile;
pub use manager::ValueManager;

/// Address of one stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValuePointer {
    pub file_id: u64,
    pub offset: u64,
    /// Value length, excluding the checksum suffix
    pub size: usize,
}

impl ValuePointer {
    /// Bytes the record occupies on disk
    pub fn stored_len(&self) -> u64 {
        (self.size + CHECKSUM_SIZE) as u64
    }
}
