//! Snapshot persistence.
//!
//! The entire engine state (entry table, then block pool, free slots and
//! free blocks included) serializes to one postcard image behind a
//! versioned header: magic, format version, geometry echo. Decoding is
//! all-or-nothing: the image is validated before any state is handed
//! back, so a snapshot written under different capacities, or one that
//! references out-of-range or freed blocks, is rejected instead of
//! deserializing garbage. Aliasing is rejected too: no two active
//! entries may share a path or a block.

use std::collections::HashSet;
use std::io;

use serde::{Deserialize, Serialize};

use crate::config::Geometry;
use crate::error::{FsError, FsResult};
use crate::pool::BlockPool;
use crate::table::EntryTable;
use crate::types::EntryKind;

/// Conventional snapshot file name, read at mount and written at unmount.
pub const SNAPSHOT_FILENAME: &str = "veilfs.img";

const MAGIC: [u8; 4] = *b"VLFS";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    magic: [u8; 4],
    version: u32,
    geometry: Geometry,
    table: EntryTable,
    pool: BlockPool,
}

fn invalid(msg: impl Into<String>) -> FsError {
    FsError::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
}

/// Serialize the full state behind the versioned header.
pub(crate) fn encode(
    geometry: Geometry,
    table: &EntryTable,
    pool: &BlockPool,
) -> FsResult<Vec<u8>> {
    let snapshot = Snapshot {
        magic: MAGIC,
        version: FORMAT_VERSION,
        geometry,
        table: table.clone(),
        pool: pool.clone(),
    };
    postcard::to_allocvec(&snapshot).map_err(|e| invalid(e.to_string()))
}

/// Decode and validate an image written by [`encode`].
pub(crate) fn decode(bytes: &[u8], expected: Geometry) -> FsResult<(EntryTable, BlockPool)> {
    let snapshot: Snapshot =
        postcard::from_bytes(bytes).map_err(|e| invalid(format!("undecodable snapshot: {e}")))?;
    if snapshot.magic != MAGIC {
        return Err(invalid("bad snapshot magic"));
    }
    if snapshot.version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    if snapshot.geometry != expected {
        return Err(invalid("snapshot geometry does not match this engine"));
    }
    validate(&snapshot.table, &snapshot.pool, expected)?;
    Ok((snapshot.table, snapshot.pool))
}

fn validate(table: &EntryTable, pool: &BlockPool, geometry: Geometry) -> FsResult<()> {
    if !table.consistent_with(geometry) || !pool.consistent_with(geometry) {
        return Err(invalid("snapshot shape does not match its geometry"));
    }
    if !table
        .slots()
        .iter()
        .any(|e| e.is_active() && e.path() == "/" && e.kind() == EntryKind::Directory)
    {
        return Err(invalid("snapshot has no active root directory"));
    }
    let mut paths = HashSet::new();
    let mut owned = vec![false; pool.block_count() as usize];
    for entry in table.slots().iter().filter(|e| e.is_active()) {
        if !paths.insert(entry.path()) {
            return Err(invalid(format!(
                "two active entries share the path {}",
                entry.path()
            )));
        }
        for handle in entry.blocks().iter().flatten() {
            if handle.index() >= pool.block_count() {
                return Err(invalid(format!(
                    "entry {} references block {} out of range",
                    entry.path(),
                    handle.index()
                )));
            }
            if pool.is_free(*handle) {
                return Err(invalid(format!(
                    "entry {} references freed block {}",
                    entry.path(),
                    handle.index()
                )));
            }
            let owner = &mut owned[handle.index() as usize];
            if *owner {
                return Err(invalid(format!(
                    "block {} has more than one referencing entry",
                    handle.index()
                )));
            }
            *owner = true;
        }
    }
    Ok(())
}
