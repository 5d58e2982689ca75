//! Read-path views built on top of the resolution order and queries.
//!
//! The sorter only guarantees dependencies-first with id tie-breaks. The
//! ranking applied here (unblocked first, then priority, then topological
//! position) is a presentation concern layered on afterwards.

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

use defer_core::config::RankingConfig;
use defer_core::{Priority, RecordId, Status};
use petgraph::Direction;
use serde::Serialize;

use crate::graph::query::{RecordIndex, active_blockers};
use crate::graph::{DependencyGraph, ResolutionOrder};

// ---------------------------------------------------------------------------
// Ranked order
// ---------------------------------------------------------------------------

/// One row of the ranked resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedRecord {
    pub id: RecordId,
    pub priority: Priority,
    pub status: Status,
    /// Active direct blockers.
    pub blockers: usize,
    /// Position in the raw resolution order.
    pub position: usize,
    /// Caught in a stored cycle; can't actually be resolved.
    pub unresolved: bool,
}

impl RankedRecord {
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.blockers > 0
    }
}

/// Re-rank a resolution order for presentation.
///
/// Sort keys, in turn: unblocked before blocked (when
/// `config.unblocked_first`), higher priority first, then raw position.
/// Completed records are skipped unless `config.include_completed`.
#[must_use]
pub fn ranked_order(
    order: &ResolutionOrder,
    graph: &DependencyGraph,
    records: &RecordIndex<'_>,
    config: &RankingConfig,
) -> Vec<RankedRecord> {
    let mut rows: Vec<RankedRecord> = order
        .order
        .iter()
        .enumerate()
        .filter_map(|(position, &id)| {
            let record = records.get(&id)?;
            if record.is_complete() && !config.include_completed {
                return None;
            }
            Some(RankedRecord {
                id,
                priority: record.priority,
                status: record.status,
                blockers: active_blockers(graph, records, id).len(),
                position,
                unresolved: order.unresolved.contains(&id),
            })
        })
        .collect();

    let unblocked_first = config.unblocked_first;
    rows.sort_by_key(|row| {
        (
            unblocked_first && row.is_blocked(),
            Reverse(row.priority),
            row.position,
        )
    });
    rows
}

// ---------------------------------------------------------------------------
// Blocked items
// ---------------------------------------------------------------------------

/// A record waiting on active blockers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedRecord {
    pub id: RecordId,
    pub blockers: Vec<RecordId>,
}

/// Every active record with at least one active blocker, ascending by id.
#[must_use]
pub fn blocked_items(graph: &DependencyGraph, records: &RecordIndex<'_>) -> Vec<BlockedRecord> {
    graph
        .record_ids()
        .into_iter()
        .filter(|id| records.get(id).is_some_and(|r| !r.is_complete()))
        .filter_map(|id| {
            let blockers = active_blockers(graph, records, id);
            (!blockers.is_empty()).then_some(BlockedRecord { id, blockers })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dependency chain
// ---------------------------------------------------------------------------

/// A transitive dependency and its distance from the queried record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    pub id: RecordId,
    /// Fewest edges between the queried record and this one.
    pub distance: usize,
}

/// Every transitive dependency of `id`, ordered by distance then id.
#[must_use]
pub fn dependency_chain(graph: &DependencyGraph, id: RecordId) -> Vec<ChainLink> {
    let Some(start) = graph.node_index(id) else {
        return Vec::new();
    };

    let mut distance = HashMap::from([(start, 0usize)]);
    let mut queue = VecDeque::from([start]);
    let mut chain = Vec::new();

    while let Some(current) = queue.pop_front() {
        let d = distance.get(&current).copied().unwrap_or_default();
        for next in graph.graph.neighbors_directed(current, Direction::Outgoing) {
            if distance.contains_key(&next) {
                continue;
            }
            distance.insert(next, d + 1);
            queue.push_back(next);
            if let Some(dep) = graph.record_id(next) {
                chain.push(ChainLink {
                    id: dep,
                    distance: d + 1,
                });
            }
        }
    }

    chain.sort_unstable_by_key(|link| (link.distance, link.id));
    chain
}
