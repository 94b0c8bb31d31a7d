//! File identity helpers
//!
//! Every on-disk file is named by the hex encoding of nine bytes: a one
//! byte [`FileType`] tag followed by the big-endian 64-bit file id.
//!
//! ```text
//! ┌──────────┬──────────────────────────┐
//! │ Type (1) │       Id (8, BE)         │  → 18 lowercase hex characters
//! └──────────┴──────────────────────────┘
//! ```

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// Length of an encoded file name
pub const FILE_NAME_LEN: usize = 18;

/// Type tag prefixing every file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileType {
    /// Bare-minimum database metadata
    Manifest = 0,
    /// Write-ahead log segment
    Wal = 1,
    /// Sorted keys with pointers to their values
    Heap = 2,
    /// Append-only value storage
    Value = 3,
}

impl TryFrom<u8> for FileType {
    type Error = u8;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        match tag {
            0 => Ok(FileType::Manifest),
            1 => Ok(FileType::Wal),
            2 => Ok(FileType::Heap),
            3 => Ok(FileType::Value),
            other => Err(other),
        }
    }
}

/// Encode a file name for the given type and id
pub fn file_name(file_type: FileType, id: u64) -> String {
    let mut raw = [0u8; 9];
    raw[0] = file_type as u8;
    raw[1..].copy_from_slice(&id.to_be_bytes());

    let mut name = String::with_capacity(FILE_NAME_LEN);
    for byte in raw {
        let _ = write!(name, "{:02x}", byte);
    }
    name
}

pub fn manifest_file_name(id: u64) -> String {
    file_name(FileType::Manifest, id)
}

pub fn wal_segment_file_name(segment_id: u64) -> String {
    file_name(FileType::Wal, segment_id)
}

pub fn heap_file_name(heap_id: u64) -> String {
    file_name(FileType::Heap, heap_id)
}

pub fn value_file_name(file_id: u64) -> String {
    file_name(FileType::Value, file_id)
}

/// Parse a file name back into its type and id
///
/// "010000000000000001" → Some((FileType::Wal, 1))
pub fn parse_file_name(name: &str) -> Option<(FileType, u64)> {
    if name.len() != FILE_NAME_LEN || !name.is_ascii() {
        return None;
    }

    let tag = u8::from_str_radix(&name[0..2], 16).ok()?;
    let file_type = FileType::try_from(tag).ok()?;

    // from_str_radix tolerates a leading '+', names never carry one
    let id_hex = &name[2..];
    if !id_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let id = u64::from_str_radix(id_hex, 16).ok()?;

    Some((file_type, id))
}

/// Ids of all files of one type in `dir`, ascending
pub fn list_files(dir: &Path, file_type: FileType) -> io::Result<Vec<u64>> {
    let mut ids = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Some((found, id)) = parse_file_name(name) {
                if found == file_type {
                    ids.push(id);
                }
            }
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Create `dir` and any missing parents; existing directories are left alone
pub fn ensure_directory(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}
