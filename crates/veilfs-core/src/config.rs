//! Engine configuration.
//!
//! All capacities are fixed at construction time. The defaults mirror the
//! legacy deployment: tiny by design so that exhaustion paths are easy to
//! hit in tests.

use serde::{Deserialize, Serialize};

/// Fixed capacities of an engine instance.
///
/// The geometry is embedded in every snapshot header, so an image written
/// under one geometry is rejected when loaded under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Bytes per block.
    pub block_size: u32,
    /// Blocks in the shared pool.
    pub block_count: u32,
    /// Entry slots in the table.
    pub max_entries: u32,
    /// Block handles per entry.
    pub max_entry_blocks: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: 8,
            block_count: 10_000,
            max_entries: 4,
            max_entry_blocks: 4,
        }
    }
}

impl Geometry {
    /// Largest byte range a single entry can address.
    pub fn max_entry_bytes(&self) -> u64 {
        self.block_size as u64 * self.max_entry_blocks as u64
    }
}

/// Construction-time engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Capacity constants.
    pub geometry: Geometry,
    /// Rotation shift for the obfuscation transform. Any integer is
    /// accepted; it is normalized into 0..26.
    pub shift: i32,
}

impl EngineConfig {
    /// Default geometry with the given rotation shift.
    pub fn with_shift(shift: i32) -> Self {
        Self {
            geometry: Geometry::default(),
            shift,
        }
    }
}
