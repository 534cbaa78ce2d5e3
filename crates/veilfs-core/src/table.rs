//! Entry table.
//!
//! A fixed vector of entry slots addressed by absolute path string. Slot 0
//! holds the root directory from construction; the root is never removable.
//! Entries reference pool blocks through handles and the table is the only
//! code that frees them, so deactivating an entry can never leak blocks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Geometry;
use crate::error::{FsError, FsResult};
use crate::paths;
use crate::pool::{BlockHandle, BlockPool};
use crate::types::{Attr, DirEntry, EntryKind};

/// A path-addressed file or directory record.
///
/// Inactive slots keep their storage (the handle vector stays at
/// `max_entry_blocks` length) so the table serializes to a fixed shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    active: bool,
    kind: EntryKind,
    path: String,
    name: String,
    mode: u32,
    nlink: u32,
    blocks: Vec<Option<BlockHandle>>,
    atime: Option<i64>,
    mtime: Option<i64>,
}

impl Entry {
    fn vacant(max_entry_blocks: u32) -> Self {
        Self {
            active: false,
            kind: EntryKind::File,
            path: String::new(),
            name: String::new(),
            mode: 0,
            nlink: 0,
            blocks: vec![None; max_entry_blocks as usize],
            atime: None,
            mtime: None,
        }
    }

    /// Whether this slot currently holds a live entry.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Entry kind.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Absolute path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Display name: the final path segment (empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mode bits including the file-type bits.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Hard link count.
    pub fn nlink(&self) -> u32 {
        self.nlink
    }

    /// Referenced block handles, absent positions included.
    pub fn blocks(&self) -> &[Option<BlockHandle>] {
        &self.blocks
    }

    pub(crate) fn block(&self, index: usize) -> Option<BlockHandle> {
        self.blocks[index]
    }

    pub(crate) fn set_block(&mut self, index: usize, handle: BlockHandle) {
        self.blocks[index] = Some(handle);
    }

    /// Attributes as reported to the dispatcher. Size is the sum of
    /// referenced-block used lengths; directories reference no blocks and
    /// report 0.
    pub fn attr(&self, pool: &BlockPool) -> Attr {
        let size = self
            .blocks
            .iter()
            .flatten()
            .map(|h| pool.used(*h) as u64)
            .sum();
        Attr {
            size,
            kind: self.kind,
            mode: self.mode,
            nlink: self.nlink,
            atime: self.atime,
            mtime: self.mtime,
        }
    }
}

/// Fixed-capacity table of path-addressed entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryTable {
    slots: Vec<Entry>,
    max_entry_blocks: u32,
}

impl EntryTable {
    /// Table with the root directory active in slot 0.
    pub fn new(geometry: Geometry) -> Self {
        assert!(geometry.max_entries >= 1, "table needs at least the root slot");
        let mut slots =
            vec![Entry::vacant(geometry.max_entry_blocks); geometry.max_entries as usize];
        let root = &mut slots[0];
        root.active = true;
        root.kind = EntryKind::Directory;
        root.path.push('/');
        root.mode = libc::S_IFDIR as u32 | 0o755;
        root.nlink = 2;
        Self {
            slots,
            max_entry_blocks: geometry.max_entry_blocks,
        }
    }

    /// Claim the first inactive slot for a new entry.
    ///
    /// Path uniqueness is the caller's contract: the dispatcher stats
    /// before it creates, so the table does not look for duplicates.
    pub fn create(&mut self, path: &str, kind: EntryKind, mode: u32) -> FsResult<()> {
        let Some(slot) = self.slots.iter_mut().find(|e| !e.active) else {
            return Err(FsError::exhausted("no free entry slots"));
        };
        slot.active = true;
        slot.kind = kind;
        slot.path = path.to_string();
        slot.name = paths::leaf_name(path).to_string();
        slot.mode = mode;
        slot.nlink = match kind {
            EntryKind::Directory => 2,
            EntryKind::File => 1,
        };
        slot.blocks.iter_mut().for_each(|b| *b = None);
        slot.atime = None;
        slot.mtime = None;
        debug!(path, ?kind, "created entry");
        Ok(())
    }

    /// Find the active entry with this exact path.
    pub fn lookup(&self, path: &str) -> Option<&Entry> {
        self.slots.iter().find(|e| e.active && e.path == path)
    }

    pub(crate) fn lookup_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.slots.iter_mut().find(|e| e.active && e.path == path)
    }

    pub(crate) fn lookup_file_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.slots
            .iter_mut()
            .find(|e| e.active && e.kind.is_file() && e.path == path)
    }

    /// Deactivate the entry with this path and kind, returning its blocks
    /// to the pool first.
    ///
    /// Directories must be empty on path-segment boundaries ("/foobar"
    /// does not block removing "/foo"), and the root is never removable.
    pub fn remove(&mut self, path: &str, kind: EntryKind, pool: &mut BlockPool) -> FsResult<()> {
        let Some(idx) = self
            .slots
            .iter()
            .position(|e| e.active && e.kind == kind && e.path == path)
        else {
            return Err(FsError::not_found(path));
        };
        if path == "/" {
            return Err(FsError::not_empty(path));
        }
        if kind == EntryKind::Directory
            && self
                .slots
                .iter()
                .any(|e| e.active && paths::is_strict_descendant(path, &e.path))
        {
            return Err(FsError::not_empty(path));
        }
        let entry = &mut self.slots[idx];
        for slot in entry.blocks.iter_mut() {
            if let Some(handle) = slot.take() {
                pool.free(handle);
            }
        }
        *entry = Entry::vacant(self.max_entry_blocks);
        debug!(path, ?kind, "removed entry");
        Ok(())
    }

    /// Shrink a file to `new_size` bytes, freeing blocks past the new end.
    ///
    /// The required block count is `new_size` divided by the block size
    /// rounded up, so size 0 keeps no blocks. The surviving last block's
    /// used length is clamped down to the bytes the new size leaves in it.
    /// Growth is a no-op; extension happens through writes.
    pub fn resize(&mut self, path: &str, new_size: u64, pool: &mut BlockPool) -> FsResult<()> {
        let block_size = pool.block_size() as u64;
        let Some(entry) = self.lookup_file_mut(path) else {
            return Err(FsError::not_found(path));
        };
        // `required` stays in u64: a narrowing cast could wrap a huge
        // size into a small block count.
        let required = new_size.div_ceil(block_size);
        let kept = required.min(entry.blocks.len() as u64) as usize;
        for slot in entry.blocks.iter_mut().skip(kept) {
            if let Some(handle) = slot.take() {
                pool.free(handle);
            }
        }
        if required >= 1 && required <= entry.blocks.len() as u64 {
            if let Some(handle) = entry.blocks[kept - 1] {
                let tail = (new_size - (required - 1) * block_size) as u32;
                pool.set_used(handle, pool.used(handle).min(tail));
            }
        }
        debug!(path, new_size, "resized entry");
        Ok(())
    }

    /// Set both timestamps on the entry with this path.
    pub fn set_times(&mut self, path: &str, atime: i64, mtime: i64) -> FsResult<()> {
        let entry = self
            .lookup_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        entry.atime = Some(atime);
        entry.mtime = Some(mtime);
        Ok(())
    }

    /// Immediate children of a directory path, in slot order.
    ///
    /// Matching is by textual prefix (see [`paths::child_name`]); there is
    /// deliberately no existence check on the directory itself.
    pub fn children_of<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = DirEntry> + 'a {
        self.slots.iter().filter(|e| e.active).filter_map(move |e| {
            paths::child_name(dir, &e.path).map(|name| DirEntry::new(name, e.kind))
        })
    }

    /// Number of active entries, root included.
    pub fn active_count(&self) -> u32 {
        self.slots.iter().filter(|e| e.active).count() as u32
    }

    pub(crate) fn slots(&self) -> &[Entry] {
        &self.slots
    }

    /// Structural agreement with a geometry. Snapshot validation relies
    /// on this.
    pub(crate) fn consistent_with(&self, geometry: Geometry) -> bool {
        self.max_entry_blocks == geometry.max_entry_blocks
            && self.slots.len() == geometry.max_entries as usize
            && self
                .slots
                .iter()
                .all(|e| e.blocks.len() == geometry.max_entry_blocks as usize)
    }
}
