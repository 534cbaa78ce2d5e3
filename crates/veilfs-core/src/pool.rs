//! Block store.
//!
//! A fixed pool of fixed-size blocks backed by one flat byte buffer plus
//! per-block metadata. The pool is the sole owner of block storage and the
//! only party that toggles free flags; entries hold [`BlockHandle`] indices
//! into it, never pointers.
//!
//! Raw byte access stays crate-internal: block contents are obfuscated, so
//! everything outside the engine goes through the read/write operations.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::Geometry;
use crate::error::{FsError, FsResult};

/// Index handle to a block in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHandle(u32);

impl BlockHandle {
    /// The pool index this handle refers to.
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlockMeta {
    free: bool,
    /// Bytes of the buffer holding valid data (0..=block_size).
    used: u32,
}

/// Fixed pool of fixed-size blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPool {
    block_size: u32,
    data: Vec<u8>,
    meta: Vec<BlockMeta>,
}

impl BlockPool {
    /// Create a pool with every block free and zeroed.
    pub fn new(geometry: Geometry) -> Self {
        let count = geometry.block_count as usize;
        Self {
            block_size: geometry.block_size,
            data: vec![0; count * geometry.block_size as usize],
            meta: vec![
                BlockMeta {
                    free: true,
                    used: 0,
                };
                count
            ],
        }
    }

    /// Claim the first free block, lowest index first.
    ///
    /// Deterministic: freeing and reallocating hands back the same block.
    pub fn allocate(&mut self) -> FsResult<BlockHandle> {
        for (i, m) in self.meta.iter_mut().enumerate() {
            if m.free {
                m.free = false;
                m.used = 0;
                trace!(block = i, "allocated block");
                return Ok(BlockHandle(i as u32));
            }
        }
        Err(FsError::exhausted("no free blocks"))
    }

    /// Return a block to the pool. Contents are not wiped.
    pub fn free(&mut self, handle: BlockHandle) {
        trace!(block = handle.0, "freed block");
        self.meta[handle.0 as usize].free = true;
    }

    /// Number of blocks with the free flag set.
    pub fn free_count(&self) -> u32 {
        self.meta.iter().filter(|m| m.free).count() as u32
    }

    /// Total blocks in the pool.
    pub fn block_count(&self) -> u32 {
        self.meta.len() as u32
    }

    /// Bytes per block.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub(crate) fn is_free(&self, handle: BlockHandle) -> bool {
        self.meta[handle.0 as usize].free
    }

    pub(crate) fn used(&self, handle: BlockHandle) -> u32 {
        self.meta[handle.0 as usize].used
    }

    pub(crate) fn set_used(&mut self, handle: BlockHandle, used: u32) {
        debug_assert!(used <= self.block_size);
        self.meta[handle.0 as usize].used = used;
    }

    pub(crate) fn data(&self, handle: BlockHandle) -> &[u8] {
        let i = handle.0 as usize;
        debug_assert!(!self.meta[i].free, "read of free block {i}");
        let start = i * self.block_size as usize;
        &self.data[start..start + self.block_size as usize]
    }

    pub(crate) fn data_mut(&mut self, handle: BlockHandle) -> &mut [u8] {
        let i = handle.0 as usize;
        debug_assert!(!self.meta[i].free, "write to free block {i}");
        let start = i * self.block_size as usize;
        &mut self.data[start..start + self.block_size as usize]
    }

    /// Structural agreement with a geometry: lengths, block size, and
    /// per-block used bounds. Snapshot validation relies on this.
    pub(crate) fn consistent_with(&self, geometry: Geometry) -> bool {
        self.block_size == geometry.block_size
            && self.meta.len() == geometry.block_count as usize
            && self.data.len() == geometry.block_count as usize * geometry.block_size as usize
            && self.meta.iter().all(|m| m.used <= self.block_size)
    }
}
