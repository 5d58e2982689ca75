//! Graph engine facade.
//!
//! [`GraphEngine`] wraps a [`RecordStore`] and exposes the write path
//! (validate, then persist, under the store's write serialisation) and the
//! read path (rebuild or reuse the graph for the current snapshot, then
//! query it).

#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use defer_core::config::{GraphConfig, ProjectConfig, RankingConfig};
use defer_core::error::ErrorCode;
use defer_core::{Record, RecordId, RecordStore, Relationship, Snapshot, Status, StoreError};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::GraphCache;
use crate::graph::query::{self, RecordIndex};
use crate::graph::{
    CycleWarning, DependencyGraph, EdgeVerdict, GraphStats, ResolutionOrder, cycles, order,
};
use crate::views::{self, BlockedRecord, ChainLink, RankedRecord};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} cannot depend on itself")]
    SelfDependency(RecordId),
    #[error("{0}")]
    CycleRejected(CycleWarning),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::SelfDependency(_) => ErrorCode::SelfDependency,
            Self::CycleRejected(_) => ErrorCode::CycleDetected,
            Self::Store(err) => err.code(),
        }
    }

    /// Offending path for rejections, `None` otherwise.
    #[must_use]
    pub fn cycle_path(&self) -> Option<Vec<RecordId>> {
        match self {
            Self::SelfDependency(id) => Some(vec![*id]),
            Self::CycleRejected(warning) => Some(warning.path.clone()),
            Self::Store(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Write outcomes
// ---------------------------------------------------------------------------

/// Result of [`GraphEngine::add_relationship`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkOutcome {
    /// `false` when the exact relationship was already stored.
    pub inserted: bool,
    /// Set when the edge closed a loop and was persisted anyway because
    /// `graph.reject_cycles` is off.
    pub cycle: Option<CycleWarning>,
}

// ---------------------------------------------------------------------------
// GraphView
// ---------------------------------------------------------------------------

/// One consistent snapshot together with its dependency graph.
#[derive(Debug, Clone)]
pub struct GraphView {
    snapshot: Snapshot,
    graph: Arc<DependencyGraph>,
    ranking: RankingConfig,
}

impl GraphView {
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    #[must_use]
    pub fn records(&self) -> RecordIndex<'_> {
        self.snapshot.records_by_id()
    }

    fn require(&self, id: RecordId) -> Result<(), EngineError> {
        if self.graph.contains(id) {
            Ok(())
        } else {
            Err(StoreError::RecordNotFound(id).into())
        }
    }

    #[must_use]
    pub fn validate_edge(&self, source: RecordId, target: RecordId) -> EdgeVerdict {
        cycles::validate_edge(&self.graph, source, target)
    }

    #[must_use]
    pub fn resolution_order(&self) -> ResolutionOrder {
        order::resolution_order(&self.graph)
    }

    #[must_use]
    pub fn resolution_layers(&self) -> Vec<Vec<RecordId>> {
        order::resolution_layers(&self.graph)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id.
    pub fn direct_dependencies(&self, id: RecordId) -> Result<Vec<RecordId>, EngineError> {
        self.require(id)?;
        Ok(query::direct_dependencies(&self.graph, id))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id.
    pub fn direct_dependents(&self, id: RecordId) -> Result<Vec<RecordId>, EngineError> {
        self.require(id)?;
        Ok(self.graph.dependents(id))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id.
    pub fn transitive_dependencies(&self, id: RecordId) -> Result<Vec<RecordId>, EngineError> {
        self.require(id)?;
        Ok(query::transitive_dependencies(&self.graph, id))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id.
    pub fn transitive_dependents(&self, id: RecordId) -> Result<Vec<RecordId>, EngineError> {
        self.require(id)?;
        Ok(query::transitive_dependents(&self.graph, id))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id.
    pub fn items_unblocked_by(&self, id: RecordId) -> Result<Vec<RecordId>, EngineError> {
        self.require(id)?;
        Ok(query::items_unblocked_by(&self.graph, &self.records(), id))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id.
    pub fn active_blocker_count(&self, id: RecordId) -> Result<usize, EngineError> {
        self.require(id)?;
        Ok(query::active_blocker_count(&self.graph, &self.records(), id))
    }

    #[must_use]
    pub fn stats(&self) -> GraphStats {
        query::stats(&self.graph, &self.records())
    }

    #[must_use]
    pub fn ranked_order(&self) -> Vec<RankedRecord> {
        let order = self.resolution_order();
        views::ranked_order(&order, &self.graph, &self.records(), &self.ranking)
    }

    #[must_use]
    pub fn blocked_items(&self) -> Vec<BlockedRecord> {
        views::blocked_items(&self.graph, &self.records())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id.
    pub fn dependency_chain(&self, id: RecordId) -> Result<Vec<ChainLink>, EngineError> {
        self.require(id)?;
        Ok(views::dependency_chain(&self.graph, id))
    }

    #[must_use]
    pub fn find_any_cycle(&self) -> Option<Vec<RecordId>> {
        cycles::find_any_cycle(&self.graph)
    }

    #[must_use]
    pub fn find_all_cycles(&self) -> Vec<Vec<RecordId>> {
        cycles::find_all_cycles(&self.graph)
    }
}

// ---------------------------------------------------------------------------
// GraphEngine
// ---------------------------------------------------------------------------

/// Dependency graph engine over a record store.
#[derive(Debug)]
pub struct GraphEngine<S> {
    store: S,
    graph_config: GraphConfig,
    ranking: RankingConfig,
    cache: GraphCache,
}

impl<S: RecordStore> GraphEngine<S> {
    /// Engine with default graph and ranking settings.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, &ProjectConfig::default())
    }

    #[must_use]
    pub fn with_config(store: S, config: &ProjectConfig) -> Self {
        let cache = if store.may_change_externally() {
            GraphCache::with_content_check()
        } else {
            GraphCache::new()
        };
        Self {
            store,
            graph_config: config.graph.clone(),
            ranking: config.ranking.clone(),
            cache,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn ranking(&self) -> &RankingConfig {
        &self.ranking
    }

    // -- read path ----------------------------------------------------------

    /// Consistent view of the current snapshot and its graph.
    ///
    /// # Errors
    ///
    /// Propagates snapshot read failures.
    pub fn view(&self) -> Result<GraphView, EngineError> {
        let snapshot = self.store.snapshot()?;
        let graph = self.cache.get_or_build(&snapshot);
        Ok(GraphView {
            snapshot,
            graph,
            ranking: self.ranking.clone(),
        })
    }

    /// Check a prospective blocking edge without persisting it.
    ///
    /// # Errors
    ///
    /// Propagates snapshot read failures. Rejections are a verdict, not an
    /// error.
    pub fn validate_edge(&self, source: RecordId, target: RecordId) -> Result<EdgeVerdict, EngineError> {
        Ok(self.view()?.validate_edge(source, target))
    }

    /// # Errors
    ///
    /// Propagates snapshot read failures.
    pub fn resolution_order(&self) -> Result<ResolutionOrder, EngineError> {
        Ok(self.view()?.resolution_order())
    }

    /// # Errors
    ///
    /// Snapshot read failures, or an unknown id.
    pub fn direct_dependencies(&self, id: RecordId) -> Result<Vec<RecordId>, EngineError> {
        self.view()?.direct_dependencies(id)
    }

    /// # Errors
    ///
    /// Snapshot read failures, or an unknown id.
    pub fn items_unblocked_by(&self, id: RecordId) -> Result<Vec<RecordId>, EngineError> {
        self.view()?.items_unblocked_by(id)
    }

    /// # Errors
    ///
    /// Propagates snapshot read failures.
    pub fn stats(&self) -> Result<GraphStats, EngineError> {
        Ok(self.view()?.stats())
    }

    // -- write path ---------------------------------------------------------

    /// Validate and persist a relationship as one atomic store write.
    ///
    /// Self-links of any kind are refused. A blocking edge that would close
    /// a loop is refused with the loop path, unless `graph.reject_cycles`
    /// is off, in which case it is stored and the loop is reported in the
    /// outcome.
    ///
    /// # Errors
    ///
    /// [`EngineError::SelfDependency`], [`EngineError::CycleRejected`], or a
    /// store failure (unknown endpoint, lock timeout, I/O).
    #[instrument(skip(self))]
    pub fn add_relationship(&self, rel: Relationship) -> Result<LinkOutcome, EngineError> {
        let reject_cycles = self.graph_config.reject_cycles;

        let outcome = self.store.write(|snap| -> Result<LinkOutcome, EngineError> {
            if rel.source == rel.target {
                warn!(id = %rel.source, "refused self-dependency");
                return Err(EngineError::SelfDependency(rel.source));
            }

            let mut cycle = None;
            if rel.is_blocking() {
                let graph = DependencyGraph::from_snapshot(snap);
                if let Some(warning) = cycles::would_create_cycle(&graph, rel.source, rel.target) {
                    if reject_cycles {
                        warn!(%warning, "refused cycle-closing relationship");
                        return Err(EngineError::CycleRejected(warning));
                    }
                    warn!(%warning, "storing cycle-closing relationship");
                    cycle = Some(warning);
                }
            }

            let inserted = snap.insert_relationship(rel)?;
            Ok(LinkOutcome { inserted, cycle })
        })?;

        self.cache.invalidate();
        info!(%rel, inserted = outcome.inserted, "relationship stored");
        Ok(outcome)
    }

    /// Remove a stored relationship. Removal never creates a cycle.
    ///
    /// # Errors
    ///
    /// [`StoreError::RelationshipNotFound`] or a store failure.
    #[instrument(skip(self))]
    pub fn remove_relationship(&self, rel: Relationship) -> Result<(), EngineError> {
        self.store
            .write(|snap| snap.remove_relationship(&rel).map_err(EngineError::from))?;
        self.cache.invalidate();
        info!(%rel, "relationship removed");
        Ok(())
    }

    /// Delete a record and every relationship touching it.
    ///
    /// # Errors
    ///
    /// [`StoreError::RecordNotFound`] or a store failure.
    #[instrument(skip(self))]
    pub fn delete_record(&self, id: RecordId) -> Result<Vec<Relationship>, EngineError> {
        let removed = self
            .store
            .write(|snap| snap.delete_record(id).map_err(EngineError::from))?;
        self.cache.invalidate();
        info!(%id, cascaded = removed.len(), "record deleted");
        Ok(removed)
    }

    /// # Errors
    ///
    /// [`StoreError::DuplicateRecord`], an invalid id, or a store failure.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub fn insert_record(&self, record: Record) -> Result<(), EngineError> {
        self.store
            .write(|snap| snap.insert_record(record).map_err(EngineError::from))?;
        self.cache.invalidate();
        Ok(())
    }

    /// Change a record's status and return the dependents this change
    /// unblocked, computed from the same snapshot the write commits.
    ///
    /// Only a transition from active to done/archived can unblock anything.
    ///
    /// # Errors
    ///
    /// [`StoreError::RecordNotFound`] or a store failure.
    #[instrument(skip(self))]
    pub fn set_status(&self, id: RecordId, status: Status) -> Result<Vec<RecordId>, EngineError> {
        let unblocked = self.store.write(|snap| -> Result<Vec<RecordId>, EngineError> {
            let was_active = !snap
                .record(id)
                .ok_or(StoreError::RecordNotFound(id))?
                .is_complete();
            let unblocked = if was_active && status.is_complete() {
                let graph = DependencyGraph::from_snapshot(snap);
                query::items_unblocked_by(&graph, &snap.records_by_id(), id)
            } else {
                Vec::new()
            };
            snap.set_status(id, status)?;
            Ok(unblocked)
        })?;
        self.cache.invalidate();
        info!(%id, %status, unblocked = unblocked.len(), "status changed");
        Ok(unblocked)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
