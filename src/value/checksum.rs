//! Value checksum
//!
//! CRC-32 over the raw value bytes, stored as a 4-byte big-endian suffix.

use crate::error::{DriftError, Result};

/// Size of the stored checksum suffix
pub const CHECKSUM_SIZE: usize = 4;

/// CRC-32 accumulator that remembers how many bytes it has seen
pub struct Checksum {
    hasher: crc32fast::Hasher,
    hashed: usize,
}

impl Checksum {
    pub fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
            hashed: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.hashed += data.len();
    }

    /// Finish, failing unless exactly `expected` bytes went in
    pub fn finish(self, expected: usize) -> Result<u32> {
        if self.hashed != expected {
            return Err(DriftError::ChecksumCreation {
                expected,
                hashed: self.hashed,
            });
        }
        Ok(self.hasher.finalize())
    }

    /// Checksum of one complete slice
    pub fn of(data: &[u8]) -> Result<u32> {
        let mut checksum = Self::new();
        checksum.update(data);
        checksum.finish(data.len())
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}
