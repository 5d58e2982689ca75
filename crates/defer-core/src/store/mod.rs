//! Storage collaborator seam.
//!
//! The graph engine never owns persistent state. It reads a [`Snapshot`]
//! through [`RecordStore::snapshot`] and performs validate-then-persist
//! through [`RecordStore::write`], which must run its closure as one atomic
//! unit relative to other writers.
//!
//! Two reference stores are provided:
//!
//! - [`memory::MemoryStore`]: mutex-guarded, for tests and embedding.
//! - [`file::FileStore`]: JSON file guarded by an advisory lock file.

pub mod file;
pub mod memory;

use std::io;
use std::path::PathBuf;

use crate::error::ErrorCode;
use crate::lock::LockError;
use crate::model::{RecordId, Relationship};
use crate::snapshot::Snapshot;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),
    #[error("record already exists: {0}")]
    DuplicateRecord(RecordId),
    #[error("relationship not found: {0}")]
    RelationshipNotFound(Relationship),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("snapshot not found at {}", .0.display())]
    SnapshotNotFound(PathBuf),
    #[error("snapshot JSON error: {0}")]
    Json(#[source] serde_json::Error),
    #[error("snapshot I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RecordNotFound(_) => ErrorCode::RecordNotFound,
            Self::DuplicateRecord(_) => ErrorCode::DuplicateRecord,
            Self::RelationshipNotFound(_) => ErrorCode::RelationshipNotFound,
            Self::InvalidSnapshot(_) | Self::Json(_) => ErrorCode::InvalidSnapshot,
            Self::SnapshotNotFound(_) => ErrorCode::SnapshotNotFound,
            Self::Io { .. } => ErrorCode::SnapshotWriteFailed,
            Self::Lock(err) => err.code(),
        }
    }
}

/// Source of snapshots and serialisation point for writes.
pub trait RecordStore {
    /// Return a consistent copy of the current records and relationships.
    ///
    /// # Errors
    ///
    /// Store-specific read failures.
    fn snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Run `f` against the current snapshot as a single atomic write.
    ///
    /// Changes are committed, and the snapshot version advanced, only when
    /// `f` returns `Ok`. On `Err` the store is left untouched.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or store failures converted into `E`.
    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, E>,
        E: From<StoreError>;

    /// Whether the stored data can change without the version advancing,
    /// e.g. a snapshot file edited outside the store.
    fn may_change_externally(&self) -> bool {
        false
    }
}
