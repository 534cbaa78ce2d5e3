//! Boundary value types.
//!
//! Everything the engine hands back to a dispatcher is a plain serializable
//! value: path-based, no handles, no borrows into engine state.

use serde::{Deserialize, Serialize};

/// Entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Entry attributes (metadata).
///
/// `size` is computed from block used-lengths at query time; directories
/// hold no blocks and always report 0. Timestamps are unix seconds and
/// stay unset until the first explicit update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attr {
    /// Size in bytes.
    pub size: u64,
    /// Entry kind.
    pub kind: EntryKind,
    /// Mode bits including the file-type bits (e.g. S_IFREG | 0o644).
    pub mode: u32,
    /// Number of hard links.
    pub nlink: u32,
    /// Last access time.
    pub atime: Option<i64>,
    /// Last modification time.
    pub mtime: Option<i64>,
}

impl Attr {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Directory)
    }
}

/// Capacity and occupancy report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    /// Entry slots in the table.
    pub entries_total: u32,
    /// Active entries (root included).
    pub entries_active: u32,
    /// Blocks in the pool.
    pub blocks_total: u32,
    /// Blocks with the free flag set.
    pub blocks_free: u32,
    /// Bytes per block.
    pub block_size: u32,
}
