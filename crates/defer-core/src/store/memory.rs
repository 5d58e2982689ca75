use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{RecordStore, StoreError};
use crate::snapshot::Snapshot;

/// In-memory store. A single mutex serialises writers, so validation and
/// persistence inside [`RecordStore::write`] can't interleave.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Snapshot>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    /// Current snapshot version without cloning the data.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    // A panic inside a write closure happens before the commit, so the
    // guarded snapshot is still the last committed state.
    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryStore {
    fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.lock().clone())
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self.lock();
        let mut working = guard.clone();
        let out = f(&mut working)?;
        working.version = guard.version + 1;
        debug!(version = working.version, "memory store committed write");
        *guard = working;
        Ok(out)
    }
}
