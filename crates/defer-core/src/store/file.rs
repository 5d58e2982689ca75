use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use super::{RecordStore, StoreError};
use crate::lock::{SnapshotReadLock, SnapshotWriteLock};
use crate::snapshot::Snapshot;

/// JSON snapshot file guarded by an advisory lock file next to it.
///
/// Writes hold an exclusive lock across read, closure and rename, so the
/// validate-then-persist sequence is atomic across processes.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            lock_timeout,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_unlocked(&self, missing_ok: bool) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            if missing_ok {
                return Ok(Snapshot::default());
            }
            return Err(StoreError::SnapshotNotFound(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        Snapshot::from_json_str(&content)
    }

    fn write_unlocked(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let json = snapshot.to_json_string()?;
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl RecordStore for FileStore {
    fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let _lock = SnapshotReadLock::acquire(&self.lock_path, self.lock_timeout)?;
        self.read_unlocked(false)
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, E>,
        E: From<StoreError>,
    {
        let lock = SnapshotWriteLock::acquire(&self.lock_path, self.lock_timeout)
            .map_err(StoreError::from)?;
        debug!(path = %lock.path().display(), "acquired snapshot write lock");

        let mut snapshot = self.read_unlocked(true)?;
        let out = f(&mut snapshot)?;
        snapshot.version += 1;
        self.write_unlocked(&snapshot)?;

        info!(
            path = %self.path.display(),
            version = snapshot.version,
            "snapshot written"
        );
        lock.release();
        Ok(out)
    }

    fn may_change_externally(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, RecordId, Relationship};

    fn store_in(dir: &Path) -> FileStore {
        FileStore::new(dir.join("snapshot.json"), Duration::from_millis(200))
    }

    #[test]
    fn missing_snapshot_is_reported_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(matches!(
            store.snapshot(),
            Err(StoreError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn first_write_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store
            .write(|snap| snap.insert_record(Record::new(1)))
            .unwrap();

        assert!(store.path().exists());
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.version, 1);
        assert!(snap.contains(RecordId(1)));
    }

    #[test]
    fn failed_write_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .write(|snap| snap.insert_record(Record::new(1)))
            .unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let result: Result<bool, StoreError> =
            store.write(|snap| snap.insert_relationship(Relationship::blocks(1, 5)));
        assert!(result.is_err());

        let after = fs::read_to_string(store.path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn lock_file_sits_next_to_snapshot() {
        let store = FileStore::new("/data/defer/snap.json", Duration::from_millis(1));
        assert_eq!(store.lock_path, PathBuf::from("/data/defer/snap.json.lock"));
    }

    #[test]
    fn held_write_lock_times_out_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("snapshot.json"), Duration::from_millis(20));
        let _held =
            SnapshotWriteLock::acquire(&store.lock_path, Duration::from_millis(50)).unwrap();

        let result: Result<(), StoreError> = store.write(|_| Ok(()));
        assert!(matches!(result, Err(StoreError::Lock(_))));
    }
}
