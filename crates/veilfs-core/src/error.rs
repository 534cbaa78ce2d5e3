//! Engine error types.

use std::io;
use thiserror::Error;

/// Engine error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// No active entry matches the path (or the snapshot file is absent).
    #[error("not found: {0}")]
    NotFound(String),

    /// A fixed capacity ran out: entry slots, pool blocks, or the
    /// per-entry block range.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Directory removal blocked by an active descendant.
    #[error("not empty: {0}")]
    NotEmpty(String),

    /// I/O error at the persistence boundary.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a ResourceExhausted error.
    pub fn exhausted(what: impl Into<String>) -> Self {
        Self::ResourceExhausted(what.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty(path.into())
    }

    /// Errno for a FUSE-style dispatcher (returned negated by the
    /// callback layer).
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::ResourceExhausted(_) => libc::ENOSPC,
            FsError::NotEmpty(_) => libc::ENOTEMPTY,
            FsError::Io(_) => libc::EIO,
        }
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::ResourceExhausted(msg) => io::Error::new(io::ErrorKind::StorageFull, msg),
            FsError::NotEmpty(msg) => io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg),
            FsError::Io(e) => e,
        }
    }
}

/// Engine result type.
pub type FsResult<T> = Result<T, FsError>;
