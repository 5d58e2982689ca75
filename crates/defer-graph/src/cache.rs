//! Snapshot-version graph cache.
//!
//! Holds the most recently built [`DependencyGraph`] with the snapshot
//! version it came from. A lookup against a different version rebuilds.
//! Writes through the engine call [`GraphCache::invalidate`].
//!
//! Stores whose contents can change behind the version counter (a snapshot
//! file edited by hand) get a cache built with
//! [`GraphCache::with_content_check`], which also compares the content
//! fingerprint on a version hit. That costs a sort and hash of the edge
//! list per lookup, the same order as the JSON parse that produced the
//! snapshot, but well below a rebuild for in-memory stores, which skip it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use defer_core::Snapshot;
use tracing::debug;

use crate::graph::{DependencyGraph, content_fingerprint};

#[derive(Debug)]
struct Entry {
    version: u64,
    graph: Arc<DependencyGraph>,
}

/// Single-slot cache owned by a `GraphEngine`.
#[derive(Debug, Default)]
pub struct GraphCache {
    slot: Mutex<Option<Entry>>,
    verify_content: bool,
}

impl GraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that also rebuilds when content changed at an unchanged version.
    #[must_use]
    pub fn with_content_check() -> Self {
        Self {
            slot: Mutex::default(),
            verify_content: true,
        }
    }

    /// Graph for `snapshot`, reusing the cached one when it still matches.
    pub fn get_or_build(&self, snapshot: &Snapshot) -> Arc<DependencyGraph> {
        let mut slot = self.lock();

        let verify = self.verify_content;
        let fresh = slot.as_ref().filter(|entry| {
            entry.version == snapshot.version
                && (!verify || entry.graph.content_hash == content_fingerprint(snapshot))
        });
        if let Some(entry) = fresh {
            return Arc::clone(&entry.graph);
        }

        debug!(version = snapshot.version, "rebuilding dependency graph");
        let graph = Arc::new(DependencyGraph::from_snapshot(snapshot));
        *slot = Some(Entry {
            version: snapshot.version,
            graph: Arc::clone(&graph),
        });
        graph
    }

    /// Drop the cached graph.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    /// Version of the cached graph, if any.
    #[must_use]
    pub fn cached_version(&self) -> Option<u64> {
        self.lock().as_ref().map(|entry| entry.version)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Entry>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
