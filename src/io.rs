//! Positioned File I/O
//!
//! The storage core never seeks: every read and write names its own offset,
//! so many threads can share one handle without a cursor lock.
//!
//! ## Capabilities
//! - [`PositionedIo`] - positioned read/write, required everywhere
//! - [`DurableSync`] - flush to durable storage, optional and checked at
//!   runtime through [`PositionedIo::durable`]
//!
//! A handle without the durable capability (e.g. [`MemoryFile`]) turns every
//! `sync()` above it into a successful no-op.

use std::fs::File;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

/// Flush-to-durable-storage capability
pub trait DurableSync {
    /// Block until previously written data survives power loss
    fn sync_data(&self) -> io::Result<()>;
}

/// A byte store addressed by absolute offsets
pub trait PositionedIo: Send + Sync {
    /// Read into `buf` starting at `offset`, returning the bytes read.
    /// May return fewer than `buf.len()`; zero means end of file.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write `buf` at `offset`, returning the bytes accepted.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Current length of the underlying store
    fn size(&self) -> io::Result<u64>;

    /// Runtime check for the durable-flush capability
    fn durable(&self) -> Option<&dyn DurableSync> {
        None
    }

    /// Keep reading until `buf` is full or the store runs out.
    ///
    /// Returns how many bytes landed in `buf`; a short count is the caller's
    /// signal for an incomplete record.
    fn read_full_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.read_at(&mut buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Keep writing until all of `buf` is accepted or the store refuses more.
    fn write_full_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.write_at(&buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}

// =============================================================================
// std::fs::File
// =============================================================================

impl DurableSync for File {
    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

impl PositionedIo for File {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }

    #[cfg(unix)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_write(self, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn durable(&self) -> Option<&dyn DurableSync> {
        Some(self)
    }
}

impl<T: PositionedIo + ?Sized> PositionedIo for Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        (**self).write_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }

    fn durable(&self) -> Option<&dyn DurableSync> {
        (**self).durable()
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Growable in-memory byte store without a durable capability.
///
/// Useful for tests and ephemeral stores. An optional length limit makes
/// writes past it come back short, the way a full device would.
#[derive(Debug, Default)]
pub struct MemoryFile {
    data: RwLock<Vec<u8>>,
    max_len: Option<u64>,
}

impl MemoryFile {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `data`
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            max_len: None,
        }
    }

    /// Create a store that refuses to grow past `max_len` bytes
    pub fn with_max_len(max_len: u64) -> Self {
        Self {
            data: RwLock::new(Vec::new()),
            max_len: Some(max_len),
        }
    }

    /// Copy of the current contents
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Truncate or zero-extend the store
    pub fn set_len(&self, len: u64) {
        self.data.write().resize(len as usize, 0);
    }

    /// Flip the bits selected by `mask` in the byte at `offset`
    pub fn flip_bits(&self, offset: u64, mask: u8) {
        if let Some(byte) = self.data.write().get_mut(offset as usize) {
            *byte ^= mask;
        }
    }
}

impl PositionedIo for MemoryFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let data = self.data.read();
        let start = offset as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut data = self.data.write();
        let start = offset as usize;
        let mut end = start + buf.len();
        if let Some(max) = self.max_len {
            end = end.min(max as usize);
            if end <= start {
                return Ok(0);
            }
        }
        if data.len() < end {
            data.resize(end, 0);
        }
        let n = end - start;
        data[start..end].copy_from_slice(&buf[..n]);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.data.read().len() as u64)
    }
}
