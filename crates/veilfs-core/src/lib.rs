//! # veilfs-core
//!
//! An in-memory filesystem engine: fixed capacities, path-addressed
//! entries, obfuscated block storage, whole-image persistence.
//!
//! The pieces, leaf first:
//! - [`pool`]: fixed pool of fixed-size blocks, first-fit allocation
//! - [`cipher`]: alphabetic rotation applied at the read/write boundary
//! - [`table`]: fixed table of path-addressed entries referencing blocks
//! - [`paths`]: the path-string rules (enumeration vs removal matching)
//! - [`engine`]: the dispatcher-facing operation surface
//! - [`snapshot`]: versioned whole-image save/load
//!
//! The OS delivery layer (a FUSE callback table, a test harness, the
//! console driver) lives outside this crate and talks to [`FsEngine`] one
//! synchronous call at a time; a multithreaded dispatcher serializes
//! entry behind its own mutex.

pub mod cipher;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod pool;
pub mod snapshot;
pub mod table;
pub mod types;

pub use cipher::RotateCipher;
pub use config::{EngineConfig, Geometry};
pub use engine::FsEngine;
pub use error::{FsError, FsResult};
pub use pool::{BlockHandle, BlockPool};
pub use snapshot::SNAPSHOT_FILENAME;
pub use table::{Entry, EntryTable};
pub use types::{Attr, DirEntry, EntryKind, Usage};
