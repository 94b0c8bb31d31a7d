//! Key types
//!
//! A [`Key`] is the raw user key. A [`TimestampedKey`] carries an 8-byte
//! big-endian transaction timestamp suffix so byte order sorts versions of
//! the same key by time.

use crate::error::{DriftError, Result};

/// Opaque user key, no embedded timestamp
pub type Key = Vec<u8>;

/// Size of the timestamp suffix
pub const TIMESTAMP_SIZE: usize = 8;

/// Key bytes followed by an 8-byte BE timestamp
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampedKey(Vec<u8>);

impl TimestampedKey {
    pub fn new(key: &[u8], timestamp: u64) -> Self {
        let mut bytes = Vec::with_capacity(key.len() + TIMESTAMP_SIZE);
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&timestamp.to_be_bytes());
        Self(bytes)
    }

    /// Wrap already-encoded bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < TIMESTAMP_SIZE {
            return Err(DriftError::Decode(format!(
                "timestamped key needs at least {} bytes, got {}",
                TIMESTAMP_SIZE,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// The key without its suffix
    pub fn key(&self) -> &[u8] {
        &self.0[..self.0.len() - TIMESTAMP_SIZE]
    }

    pub fn timestamp(&self) -> u64 {
        let mut ts = [0u8; TIMESTAMP_SIZE];
        ts.copy_from_slice(&self.0[self.0.len() - TIMESTAMP_SIZE..]);
        u64::from_be_bytes(ts)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
