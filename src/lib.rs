//! # DriftKV
//!
//! The append-only storage core of a log-structured key-value engine:
//! - Write-Ahead Log segments with lock-free dual-region allocation
//! - A flat binary transaction encoding
//! - Checksummed, append-only value files
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Commit / Flush Pipeline (caller)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ WalManager  │          │ValueManager │
//!   │ (rotation)  │          │  (RwLock)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ WalSegment  │          │  ValueFile  │
//!   │(1 atomic u64│          │(1 atomic u64│
//!   │  allocator) │          │   offset)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod files;
pub mod io;
pub mod keys;

pub mod store;
pub mod value;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, WalSyncStrategy};
pub use error::{DriftError, Result};
pub use store::Store;
pub use value::{ValueFile, ValueManager, ValuePointer};
pub use wal::{Change, Transaction, WalManager, WalSegment};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of DriftKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
