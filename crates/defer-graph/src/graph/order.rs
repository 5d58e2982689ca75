//! Deterministic resolution order.
//!
//! Kahn's algorithm over the dependency graph: a record becomes eligible
//! once every record it depends on has been emitted. Among eligible
//! records the lowest id goes first, so identical input always yields an
//! identical order.
//!
//! If persisted data holds a cycle (hand-edited snapshot, reject_cycles
//! turned off), Kahn stalls. The stalled records are appended in ascending
//! id order and also reported in [`ResolutionOrder::unresolved`]. Ordering
//! is a best-effort view; it never fails.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use defer_core::RecordId;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::warn;

use super::build::DependencyGraph;

/// Output of [`resolution_order`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionOrder {
    /// Every record exactly once. Resolvable records first.
    pub order: Vec<RecordId>,
    /// Tail of `order` that could not be placed because of a cycle.
    pub unresolved: Vec<RecordId>,
}

impl ResolutionOrder {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Zero-based position of `id` in the order.
    #[must_use]
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.order.iter().position(|&x| x == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Compute the resolution order: dependencies before dependents, ties by
/// ascending id.
#[must_use]
pub fn resolution_order(graph: &DependencyGraph) -> ResolutionOrder {
    let g = &graph.graph;
    let n = g.node_count();

    // Remaining unplaced dependencies per node.
    let mut pending: Vec<usize> = g
        .node_indices()
        .map(|idx| g.neighbors_directed(idx, Direction::Outgoing).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = g
        .node_indices()
        .filter(|idx| pending[idx.index()] == 0)
        .map(Reverse)
        .collect();

    let mut placed: Vec<NodeIndex> = Vec::with_capacity(n);
    while let Some(Reverse(idx)) = ready.pop() {
        placed.push(idx);
        for dependent in g.neighbors_directed(idx, Direction::Incoming) {
            let slot = &mut pending[dependent.index()];
            *slot = slot.saturating_sub(1);
            if *slot == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    let mut order: Vec<RecordId> = placed.iter().filter_map(|&idx| graph.record_id(idx)).collect();

    let mut unresolved = Vec::new();
    if placed.len() < n {
        let done: HashSet<NodeIndex> = placed.into_iter().collect();
        // Node indices ascend with ids.
        unresolved = g
            .node_indices()
            .filter(|idx| !done.contains(idx))
            .filter_map(|idx| graph.record_id(idx))
            .collect();
        warn!(
            count = unresolved.len(),
            "dependency cycle in stored data; appending unresolved records"
        );
        order.extend(unresolved.iter().copied());
    }

    ResolutionOrder { order, unresolved }
}

/// Group records into layers that can be worked in parallel.
///
/// Layer 0 holds records with no dependencies; layer `k` holds records
/// whose dependencies all sit in earlier layers. Each layer is ascending.
/// Records caught in a cycle appear in no layer.
#[must_use]
pub fn resolution_layers(graph: &DependencyGraph) -> Vec<Vec<RecordId>> {
    let g = &graph.graph;
    let mut pending: Vec<usize> = g
        .node_indices()
        .map(|idx| g.neighbors_directed(idx, Direction::Outgoing).count())
        .collect();

    let mut current: Vec<NodeIndex> = g
        .node_indices()
        .filter(|idx| pending[idx.index()] == 0)
        .collect();

    let mut layers = Vec::new();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &idx in &current {
            for dependent in g.neighbors_directed(idx, Direction::Incoming) {
                let slot = &mut pending[dependent.index()];
                *slot = slot.saturating_sub(1);
                if *slot == 0 {
                    next.push(dependent);
                }
            }
        }
        current.sort_unstable();
        layers.push(
            current
                .iter()
                .filter_map(|&idx| graph.record_id(idx))
                .collect(),
        );
        current = next;
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use defer_core::{Record, RelationKind, Relationship};

    fn graph(ids: &[u64], edges: &[(u64, u64)]) -> DependencyGraph {
        let records: Vec<Record> = ids.iter().copied().map(Record::new).collect();
        let rels: Vec<Relationship> = edges
            .iter()
            .map(|&(s, t)| Relationship::blocks(s, t))
            .collect();
        DependencyGraph::build(&records, &rels)
    }

    fn ids(raw: &[u64]) -> Vec<RecordId> {
        raw.iter().copied().map(RecordId).collect()
    }

    #[test]
    fn empty_graph_has_empty_order() {
        let result = resolution_order(&graph(&[], &[]));
        assert!(result.is_empty());
        assert!(result.is_complete());
    }

    #[test]
    fn independent_records_come_out_ascending() {
        let result = resolution_order(&graph(&[5, 3, 9, 1], &[]));
        assert_eq!(result.order, ids(&[1, 3, 5, 9]));
    }

    #[test]
    fn chain_orders_dependency_first() {
        // 3 → 2 → 1
        let result = resolution_order(&graph(&[1, 2, 3], &[(2, 1), (3, 2)]));
        assert_eq!(result.order, ids(&[1, 2, 3]));
        assert!(result.is_complete());
    }

    #[test]
    fn dependency_with_higher_id_still_goes_first() {
        // 1 depends on 5.
        let result = resolution_order(&graph(&[1, 2, 5], &[(1, 5)]));
        assert_eq!(result.order, ids(&[2, 5, 1]));
        assert_eq!(result.position(RecordId(1)), Some(2));
    }

    #[test]
    fn ties_break_by_ascending_id_as_they_become_ready() {
        // 4 → 1, 2 → 1, 3 free.
        let result = resolution_order(&graph(&[1, 2, 3, 4], &[(4, 1), (2, 1)]));
        assert_eq!(result.order, ids(&[1, 2, 3, 4]));
    }

    #[test]
    fn informational_links_do_not_constrain() {
        let records = vec![Record::new(1), Record::new(2)];
        let rels = vec![Relationship::new(1, 2, RelationKind::RelatesTo)];
        let result = resolution_order(&DependencyGraph::build(&records, &rels));
        assert_eq!(result.order, ids(&[1, 2]));
    }

    #[test]
    fn residual_cycle_is_appended_not_looped() {
        // 2 ↔ 3 cycle, 4 depends on 3, 1 free.
        let result = resolution_order(&graph(&[1, 2, 3, 4], &[(2, 3), (3, 2), (4, 3)]));
        assert_eq!(result.order, ids(&[1, 2, 3, 4]));
        assert_eq!(result.unresolved, ids(&[2, 3, 4]));
        assert!(!result.is_complete());
    }

    #[test]
    fn layers_group_parallel_work() {
        // 4 → {2, 3} → 1, 5 free.
        let layers = resolution_layers(&graph(&[1, 2, 3, 4, 5], &[(2, 1), (3, 1), (4, 2), (4, 3)]));
        assert_eq!(layers, vec![ids(&[1, 5]), ids(&[2, 3]), ids(&[4])]);
    }

    #[test]
    fn layers_skip_cycle_members() {
        let layers = resolution_layers(&graph(&[1, 2, 3], &[(2, 3), (3, 2)]));
        assert_eq!(layers, vec![ids(&[1])]);
    }
}
