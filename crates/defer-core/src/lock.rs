//! Advisory file locks guarding the snapshot file.
//!
//! Writers hold [`SnapshotWriteLock`] (exclusive) across the whole
//! read-validate-write sequence so two concurrent edge validations can never
//! both pass against the same stale snapshot. Readers take
//! [`SnapshotReadLock`] (shared) for a consistent read.

use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Poll interval while waiting for a contended lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    Io(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::SnapshotWriteFailed,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => write!(
                f,
                "{}: lock timed out after {:?} at {}",
                self.code(),
                waited,
                path.display()
            ),
            Self::Io(err) => write!(f, "{}: {}", self.code(), err),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout { .. } => None,
            Self::Io(err) => Some(err),
        }
    }
}

#[derive(Clone, Copy)]
enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Debug)]
struct FileGuard {
    file: File,
    path: PathBuf,
}

impl FileGuard {
    fn acquire(path: &Path, timeout: Duration, kind: LockKind) -> Result<Self, LockError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        loop {
            let contended = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file).is_err(),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file).is_err(),
            };

            if !contended {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(RETRY_INTERVAL);
        }
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Exclusive lock held for the duration of a snapshot write.
#[derive(Debug)]
pub struct SnapshotWriteLock {
    guard: FileGuard,
}

impl SnapshotWriteLock {
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Ok(Self {
            guard: FileGuard::acquire(path, timeout, LockKind::Exclusive)?,
        })
    }

    /// Release explicitly. Dropping the guard releases too.
    pub fn release(self) {
        drop(self);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.guard.path
    }
}

/// Shared lock held while reading a snapshot.
#[derive(Debug)]
pub struct SnapshotReadLock {
    guard: FileGuard,
}

impl SnapshotReadLock {
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Ok(Self {
            guard: FileGuard::acquire(path, timeout, LockKind::Shared)?,
        })
    }

    pub fn release(self) {
        drop(self);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.guard.path
    }
}
