//! Dual-Region Allocator
//!
//! Lock-free bump allocator for a fixed-capacity file. Record headers are
//! carved from the front and record bodies from the back, and both cursors
//! live in one 64-bit word so a single atomic add claims both slices.
//!
//! ```text
//!  0        8                front              back            capacity
//!  ├────────┼─────────────────┼──────────────────┼──────────────────┤
//!  │  word  │ headers  ───▶   │       free       │   ◀───  bodies   │
//!  └────────┴─────────────────┴──────────────────┴──────────────────┘
//!
//!  word = front (upper 32 bits) | back (lower 32 bits)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

use crate::error::{DriftError, Result};

/// Bytes reserved at the start of the buffer for the allocator word itself
pub const ALLOCATOR_WORD_SIZE: u32 = 8;

/// Largest capacity an allocator serves. The back cursor is read as a signed
/// 32-bit half; the room between this and the half's range lets concurrent
/// overruns pile up without wrapping into a cursor that looks valid.
pub const MAX_SEGMENT_CAPACITY: u32 = i32::MAX as u32 / 2;

/// Offsets handed out by a successful [`DualRegionAllocator::allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Start of the claimed front slice
    pub header_offset: u64,
    /// Start of the claimed back slice
    pub data_offset: u64,
}

/// Two cursors packed into one atomic word
#[derive(Debug)]
pub struct DualRegionAllocator {
    word: CachePadded<AtomicU64>,
}

impl DualRegionAllocator {
    /// Fresh allocator: front after the reserved word, back at `capacity`.
    ///
    /// Capacities above [`MAX_SEGMENT_CAPACITY`] are refused by callers; an
    /// allocator built with one hands out nothing.
    pub fn new(capacity: u32) -> Self {
        Self::from_word(pack(ALLOCATOR_WORD_SIZE, capacity))
    }

    /// Restore from the 8-byte on-disk form
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self::from_word(u64::from_be_bytes(bytes))
    }

    /// Restore from the first 8 bytes of `data`
    pub fn decode(data: &[u8]) -> Result<Self> {
        let bytes: [u8; 8] = data
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                DriftError::Decode(format!(
                    "allocator word needs 8 bytes, got {}",
                    data.len()
                ))
            })?;
        Ok(Self::from_bytes(bytes))
    }

    fn from_word(word: u64) -> Self {
        Self {
            word: CachePadded::new(AtomicU64::new(word)),
        }
    }

    /// Claim `header_len` bytes from the front and `data_len` from the back.
    ///
    /// Returns `None` when the two regions would cross; in that case the
    /// word is restored to exactly what the failed call added. A returned
    /// allocation is consumed for good, whatever happens to the writes.
    pub fn allocate(&self, header_len: u32, data_len: u32) -> Option<Allocation> {
        let needed = header_len as i64 + data_len as i64;
        if needed > self.space() {
            return None;
        }

        // front += header_len and back -= data_len as one u64 add. The
        // outcome is judged from the word we added to, so a borrow out of
        // the low half never goes unnoticed.
        let delta = ((header_len as u64) << 32).wrapping_sub(data_len as u64);
        let prev = self.word.fetch_add(delta, Ordering::AcqRel);

        match advance(prev, header_len, data_len) {
            Some((front, back)) => Some(Allocation {
                header_offset: (front - header_len as i64) as u64,
                data_offset: back as u64,
            }),
            None => {
                self.word.fetch_sub(delta, Ordering::AcqRel);
                None
            }
        }
    }

    /// Racy snapshot of `(front, back)`, for diagnostics only
    pub fn current(&self) -> (u32, u32) {
        let word = self.word.load(Ordering::Acquire);
        ((word >> 32) as u32, word as u32)
    }

    /// Racy count of unclaimed bytes between the cursors
    pub fn space(&self) -> i64 {
        let (front, back) = unpack_signed(self.word.load(Ordering::Acquire));
        back - front
    }

    /// Big-endian on-disk form, stored at offset 0 of the owning file.
    ///
    /// Never returns the transient state of an overrun that is about to
    /// be rolled back.
    pub fn encode(&self) -> [u8; 8] {
        loop {
            let word = self.word.load(Ordering::Acquire);
            let (front, back) = unpack_signed(word);
            if back >= front {
                return word.to_be_bytes();
            }
            std::hint::spin_loop();
        }
    }
}

/// Cursors after claiming `(header_len, data_len)` on top of `prev`.
///
/// `None` if the regions would cross, or if `prev` was itself the transient
/// state of other callers' overruns (back behind front, or wrapped past
/// the largest capacity).
fn advance(prev: u64, header_len: u32, data_len: u32) -> Option<(i64, i64)> {
    let (front, back) = unpack_signed(prev);
    if back < front || back > MAX_SEGMENT_CAPACITY as i64 {
        return None;
    }
    let front = front + header_len as i64;
    let back = back - data_len as i64;
    (back >= front).then_some((front, back))
}

fn pack(front: u32, back: u32) -> u64 {
    ((front as u64) << 32) | back as u64
}

/// Front as an unsigned half, back as a signed half so an overrun reads
/// as a negative cursor.
fn unpack_signed(word: u64) -> (i64, i64) {
    let front = (word >> 32) as u32 as i64;
    let back = word as u32 as i32 as i64;
    (front, back)
}
