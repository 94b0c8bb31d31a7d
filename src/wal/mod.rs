//! Write-Ahead Log (WAL) Module
//!
//! Durable, append-only record of committed transactions, split into
//! fixed-capacity segment files.
//!
//! ## Responsibilities
//! - Lock-free space allocation inside a segment (dual-region allocator)
//! - Binary transaction encoding
//! - Segment rotation when a segment fills up or passes its size limit
//! - Primitives a recovery pass can replay (headers, bodies); replay
//!   itself lives outside this crate
//!
//! ## Segment Layout
//! ```text
//! ┌──────────────┬────────────────────┬─────────┬────────────────────┐
//! │ Allocator(8) │ Header │ Header │→  │  free   │  ←│ Body │ Body    │
//! └──────────────┴────────────────────┴─────────┴────────────────────┘
//! 0              8                  front      back           capacity
//! ```

mod allocator;
mod manager;
mod segment;
mod transaction;

pub use allocator::{Allocation, DualRegionAllocator, ALLOCATOR_WORD_SIZE, MAX_SEGMENT_CAPACITY};
pub use manager::{AppendResult, WalManager};
pub use segment::{RecordHeader, WalSegment};
pub use transaction::{Change, Transaction, TRANSACTION_PREFIX_SIZE};

/// Bytes at the start of every segment before the header region
pub const SEGMENT_HEADER_SIZE: u32 = ALLOCATOR_WORD_SIZE;

/// Size of one record header in the front region
pub const RECORD_HEADER_SIZE: u32 = 16;
