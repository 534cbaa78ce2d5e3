//! The filesystem engine.
//!
//! `FsEngine` is the boundary surface a dispatcher talks to: one method per
//! delivered call, synchronous, no internal locking. A multithreaded
//! dispatcher serializes entry behind its own mutex.
//!
//! Data moves through the obfuscation transform exactly at this boundary:
//! writes encrypt into the block, reads decrypt into the caller's buffer,
//! always over the exact transferred span.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::cipher::RotateCipher;
use crate::config::{EngineConfig, Geometry};
use crate::error::{FsError, FsResult};
use crate::pool::BlockPool;
use crate::snapshot;
use crate::table::EntryTable;
use crate::types::{Attr, DirEntry, EntryKind, Usage};

/// In-memory filesystem engine with snapshot persistence.
pub struct FsEngine {
    geometry: Geometry,
    cipher: RotateCipher,
    table: EntryTable,
    pool: BlockPool,
}

impl FsEngine {
    /// Create a fresh engine: root directory only, every block free.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            geometry: config.geometry,
            cipher: RotateCipher::new(config.shift),
            table: EntryTable::new(config.geometry),
            pool: BlockPool::new(config.geometry),
        }
    }

    /// The capacity constants this engine was built with.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    // ===== Metadata =====

    /// Attributes of the entry at `path`.
    pub fn getattr(&self, path: &str) -> FsResult<Attr> {
        debug!(path, "getattr");
        self.table
            .lookup(path)
            .map(|e| e.attr(&self.pool))
            .ok_or_else(|| FsError::not_found(path))
    }

    /// Immediate children of the directory at `path`, in table order.
    ///
    /// The dispatcher stats the directory before listing it, so a missing
    /// path yields an empty listing rather than an error.
    pub fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        debug!(path, "readdir");
        Ok(self.table.children_of(path).collect())
    }

    /// Open notification. The engine keeps no per-open state.
    pub fn open(&self, path: &str) -> FsResult<()> {
        debug!(path, "open");
        Ok(())
    }

    /// Close notification. The engine keeps no per-open state.
    pub fn release(&self, path: &str) -> FsResult<()> {
        debug!(path, "release");
        Ok(())
    }

    /// Create a regular file at `path`.
    pub fn create_file(&mut self, path: &str, mode: u32) -> FsResult<()> {
        debug!(path, mode, "create_file");
        self.table
            .create(path, EntryKind::File, libc::S_IFREG as u32 | mode)
    }

    /// Create a directory at `path`.
    pub fn create_dir(&mut self, path: &str, mode: u32) -> FsResult<()> {
        debug!(path, mode, "create_dir");
        self.table
            .create(path, EntryKind::Directory, libc::S_IFDIR as u32 | mode)
    }

    /// Remove the file at `path`, returning its blocks to the pool.
    pub fn remove_file(&mut self, path: &str) -> FsResult<()> {
        debug!(path, "remove_file");
        self.table.remove(path, EntryKind::File, &mut self.pool)
    }

    /// Remove the empty directory at `path`.
    pub fn remove_dir(&mut self, path: &str) -> FsResult<()> {
        debug!(path, "remove_dir");
        self.table
            .remove(path, EntryKind::Directory, &mut self.pool)
    }

    /// Shrink the file at `path` to `new_size` bytes.
    pub fn truncate(&mut self, path: &str, new_size: u64) -> FsResult<()> {
        debug!(path, new_size, "truncate");
        self.table.resize(path, new_size, &mut self.pool)
    }

    /// Set access and modification times on the entry at `path`.
    pub fn set_times(&mut self, path: &str, atime: i64, mtime: i64) -> FsResult<()> {
        debug!(path, atime, mtime, "set_times");
        self.table.set_times(path, atime, mtime)
    }

    /// Capacity and occupancy report.
    pub fn usage(&self) -> Usage {
        Usage {
            entries_total: self.geometry.max_entries,
            entries_active: self.table.active_count(),
            blocks_total: self.geometry.block_count,
            blocks_free: self.pool.free_count(),
            block_size: self.geometry.block_size,
        }
    }

    // ===== Data plane =====

    /// Read from the file at `path` into `buf`, starting at byte `offset`.
    ///
    /// Returns the number of bytes transferred. The walk stops at the
    /// first absent block, so a read past the populated range is a short
    /// count, not an error. Transfers are block-granular: the span copied
    /// from a present block ignores its used length.
    pub fn read(&self, path: &str, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        debug!(path, offset, len = buf.len(), "read");
        let entry = self
            .table
            .lookup(path)
            .filter(|e| e.kind().is_file())
            .ok_or_else(|| FsError::not_found(path))?;

        let block_size = self.geometry.block_size as usize;
        let max_blocks = self.geometry.max_entry_blocks as usize;
        // Bound the index in u64; narrowed first, a huge offset could
        // wrap back into range.
        let index = offset / block_size as u64;
        if index >= max_blocks as u64 {
            return Err(FsError::exhausted(format!(
                "offset {offset} beyond the {max_blocks}-block range"
            )));
        }
        let mut index = index as usize;
        let mut in_block = (offset % block_size as u64) as usize;

        let mut transferred = 0;
        while transferred < buf.len() && index < max_blocks {
            let Some(handle) = entry.block(index) else {
                break;
            };
            let span = (buf.len() - transferred).min(block_size - in_block);
            let dst = &mut buf[transferred..transferred + span];
            dst.copy_from_slice(&self.pool.data(handle)[in_block..in_block + span]);
            self.cipher.decrypt(dst);
            transferred += span;
            in_block = 0;
            index += 1;
        }
        Ok(transferred)
    }

    /// Write `data` to the file at `path`, starting at byte `offset`.
    ///
    /// Blocks are allocated on first touch. Returns the number of bytes
    /// transferred; running out of blocks or block range mid-call commits
    /// the partial count, and only a write that moved nothing reports
    /// exhaustion. A block's used length becomes `in-block offset +
    /// transferred span` (replacement, not a maximum), so a short
    /// overwrite shrinks the reported size.
    pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> FsResult<usize> {
        debug!(path, offset, len = data.len(), "write");
        let geometry = self.geometry;
        let entry = self
            .table
            .lookup_file_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;

        let block_size = geometry.block_size as usize;
        let max_blocks = geometry.max_entry_blocks as usize;
        let index = offset / block_size as u64;
        if index >= max_blocks as u64 {
            return Err(FsError::exhausted(format!(
                "offset {offset} beyond the {max_blocks}-block range"
            )));
        }
        let mut index = index as usize;
        let mut in_block = (offset % block_size as u64) as usize;

        let mut transferred = 0;
        while transferred < data.len() && index < max_blocks {
            let handle = match entry.block(index) {
                Some(handle) => handle,
                None => match self.pool.allocate() {
                    Ok(handle) => {
                        entry.set_block(index, handle);
                        handle
                    }
                    Err(e) if transferred == 0 => return Err(e),
                    Err(_) => break,
                },
            };
            let span = (data.len() - transferred).min(block_size - in_block);
            let block = &mut self.pool.data_mut(handle)[in_block..in_block + span];
            block.copy_from_slice(&data[transferred..transferred + span]);
            self.cipher.encrypt(block);
            self.pool.set_used(handle, (in_block + span) as u32);
            transferred += span;
            in_block = 0;
            index += 1;
        }
        Ok(transferred)
    }

    // ===== Persistence =====

    /// Serialize the whole engine state to `snapshot_path`, overwriting.
    pub fn save(&self, snapshot_path: &Path) -> FsResult<()> {
        let bytes = snapshot::encode(self.geometry, &self.table, &self.pool)?;
        fs::write(snapshot_path, &bytes)?;
        info!(
            path = %snapshot_path.display(),
            bytes = bytes.len(),
            "saved snapshot"
        );
        Ok(())
    }

    /// Replace the engine state with a validated snapshot.
    ///
    /// All-or-nothing: a missing file is NotFound, a malformed or
    /// mismatched image is an invalid-data I/O error, and in either case
    /// the current state is untouched.
    pub fn load(&mut self, snapshot_path: &Path) -> FsResult<()> {
        let bytes = match fs::read(snapshot_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FsError::not_found(snapshot_path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let (table, pool) = snapshot::decode(&bytes, self.geometry)?;
        self.table = table;
        self.pool = pool;
        info!(
            path = %snapshot_path.display(),
            entries = self.table.active_count(),
            "loaded snapshot"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FsEngine {
        FsEngine::new(EngineConfig::default())
    }

    fn engine_with(geometry: Geometry, shift: i32) -> FsEngine {
        FsEngine::new(EngineConfig { geometry, shift })
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        for n in [1usize, 7, 8, 9, 16, 31, 32] {
            let data: Vec<u8> = (0..n as u8).map(|i| b'a' + (i % 26)).collect();
            assert_eq!(fs.write("/a", 0, &data).unwrap(), n);
            let mut buf = vec![0; n];
            assert_eq!(fs.read("/a", 0, &mut buf).unwrap(), n);
            assert_eq!(buf, data, "length {n}");
        }
    }

    #[test]
    fn read_and_write_at_an_offset_cross_blocks() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        fs.write("/a", 0, b"abcdefghij").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(fs.read("/a", 6, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ghij");

        assert_eq!(fs.write("/a", 6, b"GHIJ").unwrap(), 4);
        let mut buf = [0u8; 10];
        assert_eq!(fs.read("/a", 0, &mut buf).unwrap(), 10);
        assert_eq!(&buf, b"abcdefGHIJ");
    }

    #[test]
    fn reads_are_block_granular_past_the_used_length() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        fs.write("/a", 0, b"hello").unwrap();
        assert_eq!(fs.getattr("/a").unwrap().size, 5);

        // One block is present, so a large buffer sees the whole block.
        let mut buf = [0xAAu8; 16];
        assert_eq!(fs.read("/a", 0, &mut buf).unwrap(), 8);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(&buf[5..8], &[0, 0, 0]);
    }

    #[test]
    fn short_overwrite_shrinks_the_reported_size() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        fs.write("/a", 0, b"12345678").unwrap();
        assert_eq!(fs.getattr("/a").unwrap().size, 8);

        fs.write("/a", 0, b"xy").unwrap();
        assert_eq!(fs.getattr("/a").unwrap().size, 2);
    }

    #[test]
    fn write_past_capacity_commits_the_partial_count() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        let data = [b'z'; 40];
        assert_eq!(fs.write("/a", 0, &data).unwrap(), 32);
        assert_eq!(fs.getattr("/a").unwrap().size, 32);
    }

    #[test]
    fn offset_beyond_the_block_range_is_exhaustion() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        let err = fs.write("/a", 32, b"x").unwrap_err();
        assert!(matches!(err, FsError::ResourceExhausted(_)));
        let err = fs.read("/a", 1000, &mut [0; 4]).unwrap_err();
        assert!(matches!(err, FsError::ResourceExhausted(_)));
    }

    #[test]
    fn enormous_offsets_stay_out_of_range() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();

        // offset / block_size is 1 << 32, which a 32-bit narrowing would
        // wrap to block 0.
        let offset = (1u64 << 32) * Geometry::default().block_size as u64;
        assert!(matches!(
            fs.read("/a", offset, &mut [0; 4]).unwrap_err(),
            FsError::ResourceExhausted(_)
        ));
        assert!(matches!(
            fs.write("/a", offset, b"x").unwrap_err(),
            FsError::ResourceExhausted(_)
        ));
        assert!(matches!(
            fs.write("/a", u64::MAX, b"x").unwrap_err(),
            FsError::ResourceExhausted(_)
        ));
        assert_eq!(fs.getattr("/a").unwrap().size, 0);
    }

    #[test]
    fn a_hole_stops_reads_from_the_start() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        // Touches only block 2; blocks 0 and 1 stay absent.
        assert_eq!(fs.write("/a", 16, b"deepdata").unwrap(), 8);
        assert_eq!(fs.getattr("/a").unwrap().size, 8);

        let mut buf = [0u8; 8];
        assert_eq!(fs.read("/a", 0, &mut buf).unwrap(), 0);
        assert_eq!(fs.read("/a", 16, &mut buf).unwrap(), 8);
        assert_eq!(&buf, b"deepdata");
    }

    #[test]
    fn pool_exhaustion_mid_write_commits_partial_and_empty_write_errors() {
        let geometry = Geometry {
            block_count: 1,
            ..Geometry::default()
        };
        let mut fs = engine_with(geometry, 0);
        fs.create_file("/a", 0o644).unwrap();
        fs.create_file("/b", 0o644).unwrap();

        // The only block absorbs the first 8 bytes, then allocation fails.
        assert_eq!(fs.write("/a", 0, &[b'q'; 10]).unwrap(), 8);

        // Nothing can land for the second file.
        let err = fs.write("/b", 0, b"x").unwrap_err();
        assert!(matches!(err, FsError::ResourceExhausted(_)));
    }

    #[test]
    fn stored_bytes_are_rotated_and_reads_undo_it() {
        let mut fs = engine_with(Geometry::default(), 3);
        fs.create_file("/a", 0o644).unwrap();
        fs.write("/a", 0, b"Hi").unwrap();

        let handle = fs.table.lookup("/a").unwrap().blocks()[0].unwrap();
        assert_eq!(&fs.pool.data(handle)[..2], b"Kl");

        let mut buf = [0u8; 2];
        fs.read("/a", 0, &mut buf).unwrap();
        assert_eq!(&buf, b"Hi");
    }

    #[test]
    fn create_file_composes_regular_mode_bits() {
        let mut fs = engine();
        fs.create_file("/a", 0o640).unwrap();
        let attr = fs.getattr("/a").unwrap();
        assert_eq!(attr.mode & libc::S_IFMT as u32, libc::S_IFREG as u32);
        assert_eq!(attr.mode & 0o777, 0o640);
        assert_eq!(attr.nlink, 1);
    }

    #[test]
    fn create_dir_composes_directory_mode_bits() {
        let mut fs = engine();
        fs.create_dir("/d", 0o700).unwrap();
        let attr = fs.getattr("/d").unwrap();
        assert_eq!(attr.mode & libc::S_IFMT as u32, libc::S_IFDIR as u32);
        assert_eq!(attr.mode & 0o777, 0o700);
        assert!(attr.is_dir());
    }

    #[test]
    fn remove_file_restores_pool_accounting() {
        let mut fs = engine();
        let free_before = fs.usage().blocks_free;
        fs.create_file("/a", 0o644).unwrap();
        fs.write("/a", 0, &[b'x'; 20]).unwrap();
        assert_eq!(fs.usage().blocks_free, free_before - 3);

        fs.remove_file("/a").unwrap();
        assert!(matches!(fs.getattr("/a").unwrap_err(), FsError::NotFound(_)));
        assert_eq!(fs.usage().blocks_free, free_before);
    }

    #[test]
    fn data_operations_reject_directories() {
        let mut fs = engine();
        fs.create_dir("/d", 0o755).unwrap();
        assert!(matches!(
            fs.read("/d", 0, &mut [0; 4]).unwrap_err(),
            FsError::NotFound(_)
        ));
        assert!(matches!(
            fs.write("/d", 0, b"x").unwrap_err(),
            FsError::NotFound(_)
        ));
    }

    #[test]
    fn open_and_release_are_no_ops() {
        let fs = engine();
        fs.open("/does-not-exist").unwrap();
        fs.release("/does-not-exist").unwrap();
    }

    #[test]
    fn readdir_reflects_creations() {
        let mut fs = engine();
        fs.create_dir("/docs", 0o755).unwrap();
        fs.create_file("/docs/a", 0o644).unwrap();

        let names: Vec<_> = fs
            .readdir("/")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["docs"]);

        let children = fs.readdir("/docs").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "a");
        assert!(children[0].kind.is_file());
    }

    #[test]
    fn truncate_then_write_reuses_the_freed_blocks() {
        let mut fs = engine();
        fs.create_file("/a", 0o644).unwrap();
        fs.write("/a", 0, &[b'x'; 32]).unwrap();
        fs.truncate("/a", 8).unwrap();
        assert_eq!(fs.getattr("/a").unwrap().size, 8);

        fs.write("/a", 8, &[b'y'; 8]).unwrap();
        assert_eq!(fs.getattr("/a").unwrap().size, 16);
    }

    #[test]
    fn usage_reports_fresh_state() {
        let fs = engine();
        let usage = fs.usage();
        assert_eq!(usage.entries_total, 4);
        assert_eq!(usage.entries_active, 1);
        assert_eq!(usage.blocks_total, 10_000);
        assert_eq!(usage.blocks_free, 10_000);
        assert_eq!(usage.block_size, 8);
    }
}
