//! Derived queries over a built graph plus record statuses.
//!
//! A record is *blocked* while any of its direct dependencies is still
//! active (neither done nor archived).

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};

use defer_core::{Record, RecordId};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use super::build::DependencyGraph;

/// Records indexed by id, as produced by `Snapshot::records_by_id`.
pub type RecordIndex<'a> = HashMap<RecordId, &'a Record>;

fn is_active(records: &RecordIndex<'_>, id: RecordId) -> bool {
    records.get(&id).is_some_and(|r| !r.is_complete())
}

/// Direct dependencies of `id`, ascending. Empty for unknown ids.
#[must_use]
pub fn direct_dependencies(graph: &DependencyGraph, id: RecordId) -> Vec<RecordId> {
    graph.dependencies(id)
}

/// Number of direct dependencies of `id` that are still active.
#[must_use]
pub fn active_blocker_count(graph: &DependencyGraph, records: &RecordIndex<'_>, id: RecordId) -> usize {
    active_blockers(graph, records, id).len()
}

/// Direct dependencies of `id` that are still active, ascending.
#[must_use]
pub fn active_blockers(graph: &DependencyGraph, records: &RecordIndex<'_>, id: RecordId) -> Vec<RecordId> {
    graph
        .dependencies(id)
        .into_iter()
        .filter(|&dep| is_active(records, dep))
        .collect()
}

#[must_use]
pub fn is_blocked(graph: &DependencyGraph, records: &RecordIndex<'_>, id: RecordId) -> bool {
    graph
        .dependencies(id)
        .into_iter()
        .any(|dep| is_active(records, dep))
}

/// Direct dependents of `id` that would have no active blocker left once
/// `id` completes.
///
/// Dependents that are themselves already complete are not reported.
#[must_use]
pub fn items_unblocked_by(graph: &DependencyGraph, records: &RecordIndex<'_>, id: RecordId) -> Vec<RecordId> {
    graph
        .dependents(id)
        .into_iter()
        .filter(|&dependent| is_active(records, dependent))
        .filter(|&dependent| {
            graph
                .dependencies(dependent)
                .into_iter()
                .filter(|&other| other != id)
                .all(|other| !is_active(records, other))
        })
        .collect()
}

/// Everything `id` depends on, directly or not, ascending.
#[must_use]
pub fn transitive_dependencies(graph: &DependencyGraph, id: RecordId) -> Vec<RecordId> {
    reachable(graph, id, Direction::Outgoing)
}

/// Everything that depends on `id`, directly or not, ascending.
#[must_use]
pub fn transitive_dependents(graph: &DependencyGraph, id: RecordId) -> Vec<RecordId> {
    reachable(graph, id, Direction::Incoming)
}

fn reachable(graph: &DependencyGraph, id: RecordId, dir: Direction) -> Vec<RecordId> {
    let Some(start) = graph.node_index(id) else {
        return Vec::new();
    };

    let mut seen: HashSet<NodeIndex> = HashSet::from([start]);
    let mut stack = vec![start];
    let mut out = Vec::new();
    while let Some(current) = stack.pop() {
        for next in graph.graph.neighbors_directed(current, dir) {
            if seen.insert(next) {
                out.extend(graph.record_id(next));
                stack.push(next);
            }
        }
    }
    // A record on a cycle through itself is not its own dependency.
    out.retain(|&x| x != id);
    out.sort_unstable();
    out
}

// ---------------------------------------------------------------------------
// GraphStats
// ---------------------------------------------------------------------------

/// Aggregate health numbers for the dependency graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Records in the graph.
    pub total_items: usize,
    /// Records with at least one blocking dependency.
    pub items_with_dependencies: usize,
    /// Records with at least one active blocker.
    pub blocked_items: usize,
    /// Longest dependency path, counted in edges.
    pub max_depth: usize,
    /// Distinct blocking edges.
    pub edge_count: usize,
}

/// Compute [`GraphStats`].
#[must_use]
pub fn stats(graph: &DependencyGraph, records: &RecordIndex<'_>) -> GraphStats {
    let g = &graph.graph;
    let mut items_with_dependencies = 0;
    let mut blocked_items = 0;

    for idx in g.node_indices() {
        let Some(id) = graph.record_id(idx) else {
            continue;
        };
        if g.neighbors_directed(idx, Direction::Outgoing).next().is_some() {
            items_with_dependencies += 1;
        }
        if is_blocked(graph, records, id) {
            blocked_items += 1;
        }
    }

    GraphStats {
        total_items: graph.node_count(),
        items_with_dependencies,
        blocked_items,
        max_depth: max_depth(graph),
        edge_count: graph.edge_count(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Depth {
    Unvisited,
    Active,
    Done(usize),
}

/// Longest dependency path in edges.
///
/// Memoised post-order walk with an explicit stack. An edge back into a
/// node that is still on the stack contributes zero, so persisted cycles
/// terminate instead of spinning.
#[must_use]
pub fn max_depth(graph: &DependencyGraph) -> usize {
    let g = &graph.graph;
    let mut depth = vec![Depth::Unvisited; g.node_count()];
    let mut best = 0;

    for root in g.node_indices() {
        if depth[root.index()] != Depth::Unvisited {
            continue;
        }

        // (node, dependencies, next position, deepest child so far + 1)
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize, usize)> = vec![(
            root,
            g.neighbors_directed(root, Direction::Outgoing).collect(),
            0,
            0,
        )];
        depth[root.index()] = Depth::Active;

        while let Some(frame) = stack.last_mut() {
            if let Some(&child) = frame.1.get(frame.2) {
                frame.2 += 1;
                match depth[child.index()] {
                    Depth::Done(d) => frame.3 = frame.3.max(d + 1),
                    Depth::Active => {}
                    Depth::Unvisited => {
                        depth[child.index()] = Depth::Active;
                        let deps = g.neighbors_directed(child, Direction::Outgoing).collect();
                        stack.push((child, deps, 0, 0));
                    }
                }
                continue;
            }

            let (node, d) = (frame.0, frame.3);
            depth[node.index()] = Depth::Done(d);
            best = best.max(d);
            stack.pop();
            if let Some(parent) = stack.last_mut() {
                parent.3 = parent.3.max(d + 1);
            }
        }
    }

    best
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
