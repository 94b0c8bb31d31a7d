//! WAL Transaction codec
//!
//! ## Wire Format (all integers big-endian)
//! ```text
//! ┌───────────┬───────────┬───────────┬──────────────┬───────────┐
//! │ TxnId (8) │ Ts (8)    │ HeapId(8) │ ValueFile(8) │ Count (2) │
//! └───────────┴───────────┴───────────┴──────────────┴───────────┘
//! then Count changes:
//! ┌──────────┬────────────┬─────┬──────────────┬───────┐
//! │ Type (1) │ KeyLen (4) │ Key │ ValLen (4)   │ Value │   (value part only for Set)
//! └──────────┴────────────┴─────┴──────────────┴───────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DriftError, Result};
use crate::keys::Key;

/// Fixed prefix: four u64 fields plus the u16 change count
pub const TRANSACTION_PREFIX_SIZE: usize = 8 * 4 + 2;

/// Change type tags
const CHANGE_SET: u8 = 0;
const CHANGE_DELETE: u8 = 1;

/// A single change inside a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Store `value` under `key`
    Set { key: Key, value: Vec<u8> },

    /// Remove `key`; carries no value
    Delete { key: Key },
}

impl Change {
    pub fn key(&self) -> &[u8] {
        match self {
            Change::Set { key, .. } | Change::Delete { key } => key,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Change::Set { .. } => CHANGE_SET,
            Change::Delete { .. } => CHANGE_DELETE,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Change::Set { key, value } => 1 + 4 + key.len() + 4 + value.len(),
            Change::Delete { key } => 1 + 4 + key.len(),
        }
    }
}

/// An ordered batch of changes that commits all together or not at all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Caller-assigned, monotonic
    pub id: u64,

    /// MVCC timestamp
    pub timestamp: u64,

    /// Heap file holding the keys, 0 until flushed
    pub heap_id: u64,

    /// Value file holding the values, 0 until flushed
    pub value_file_id: u64,

    pub changes: Vec<Change>,
}

impl Transaction {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Append a Set change
    pub fn set(mut self, key: impl Into<Key>, value: impl Into<Vec<u8>>) -> Self {
        self.changes.push(Change::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append a Delete change
    pub fn delete(mut self, key: impl Into<Key>) -> Self {
        self.changes.push(Change::Delete { key: key.into() });
        self
    }

    /// Size of `encode()`'s output
    pub fn encoded_len(&self) -> usize {
        TRANSACTION_PREFIX_SIZE + self.changes.iter().map(Change::encoded_len).sum::<usize>()
    }

    /// Encode to the flat wire layout
    pub fn encode(&self) -> Result<Bytes> {
        if self.changes.is_empty() {
            return Err(DriftError::InvalidTransaction(format!(
                "transaction {} has no changes",
                self.id
            )));
        }
        let count = u16::try_from(self.changes.len()).map_err(|_| {
            DriftError::InvalidTransaction(format!(
                "transaction {} has {} changes (max {})",
                self.id,
                self.changes.len(),
                u16::MAX
            ))
        })?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u64(self.id);
        buf.put_u64(self.timestamp);
        buf.put_u64(self.heap_id);
        buf.put_u64(self.value_file_id);
        buf.put_u16(count);

        for change in &self.changes {
            buf.put_u8(change.tag());
            put_field(&mut buf, change.key(), "key")?;
            if let Change::Set { value, .. } = change {
                put_field(&mut buf, value, "value")?;
            }
        }

        Ok(buf.freeze())
    }

    /// Strict inverse of [`Transaction::encode`]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        if buf.remaining() < TRANSACTION_PREFIX_SIZE {
            return Err(DriftError::Decode(format!(
                "transaction prefix needs {} bytes, got {}",
                TRANSACTION_PREFIX_SIZE,
                buf.remaining()
            )));
        }

        let id = buf.get_u64();
        let timestamp = buf.get_u64();
        let heap_id = buf.get_u64();
        let value_file_id = buf.get_u64();
        let count = buf.get_u16() as usize;
        if count == 0 {
            return Err(DriftError::Decode(format!("transaction {} has no changes", id)));
        }

        let mut changes = Vec::with_capacity(count);
        for index in 0..count {
            if !buf.has_remaining() {
                return Err(DriftError::Decode(format!(
                    "transaction {} declares {} changes, only {} present",
                    id, count, index
                )));
            }
            let change = match buf.get_u8() {
                CHANGE_SET => {
                    let key = get_field(&mut buf, "key")?;
                    let value = get_field(&mut buf, "value")?;
                    Change::Set { key, value }
                }
                CHANGE_DELETE => Change::Delete {
                    key: get_field(&mut buf, "key")?,
                },
                other => {
                    return Err(DriftError::Decode(format!(
                        "unknown change type: 0x{:02x}",
                        other
                    )))
                }
            };
            changes.push(change);
        }

        if buf.has_remaining() {
            return Err(DriftError::Decode(format!(
                "{} trailing bytes after {} changes",
                buf.remaining(),
                count
            )));
        }

        Ok(Self {
            id,
            timestamp,
            heap_id,
            value_file_id,
            changes,
        })
    }
}

fn put_field(buf: &mut BytesMut, field: &[u8], what: &str) -> Result<()> {
    let len = u32::try_from(field.len()).map_err(|_| {
        DriftError::InvalidTransaction(format!("{} of {} bytes is too large", what, field.len()))
    })?;
    buf.put_u32(len);
    buf.put_slice(field);
    Ok(())
}

fn get_field(buf: &mut &[u8], what: &str) -> Result<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(DriftError::Decode(format!("missing {} length", what)));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(DriftError::Decode(format!(
            "incomplete {} (expected {}, got {})",
            what,
            len,
            buf.remaining()
        )));
    }
    let field = buf[..len].to_vec();
    buf.advance(len);
    Ok(field)
}
