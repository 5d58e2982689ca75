//! Cycle detection for the blocking-semantic dependency graph.
//!
//! # Edge Direction
//!
//! Edges run dependent → dependency. Adding `source → target` closes a
//! cycle exactly when `source` is already reachable from `target`.
//!
//! # Entry Points
//!
//! - [`would_create_cycle`]: write-path check for one prospective edge.
//! - [`validate_edge`]: the same check folded into an [`EdgeVerdict`].
//! - [`find_any_cycle`]: colouring walk over an already-built graph, for
//!   data that bypassed the write-time check.
//! - [`find_all_cycles`]: every cyclic strongly connected component.
//!
//! All walks keep an explicit stack; long chains never touch the call stack.

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use defer_core::RecordId;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use super::build::DependencyGraph;

// ---------------------------------------------------------------------------
// CycleWarning
// ---------------------------------------------------------------------------

/// A prospective blocking edge that would close a loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleWarning {
    /// Cycle as `source, …, target, source`: the existing walk from
    /// `target` back to `source`, reversed, closed by the new edge.
    ///
    /// A self-dependency is the single element `[source]`.
    pub path: Vec<RecordId>,
    /// Dependent side of the new edge.
    pub source: RecordId,
    /// Dependency side of the new edge.
    pub target: RecordId,
}

impl CycleWarning {
    fn self_loop(id: RecordId) -> Self {
        Self {
            path: vec![id],
            source: id,
            target: id,
        }
    }

    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Number of distinct records in the loop.
    #[must_use]
    pub fn cycle_len(&self) -> usize {
        if self.is_self_loop() {
            1
        } else {
            self.path.len().saturating_sub(1)
        }
    }
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_loop() {
            return write!(
                f,
                "adding this would create a loop: {} cannot depend on itself",
                self.source
            );
        }
        f.write_str("adding this would create a loop: ")?;
        for (i, id) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(" → ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EdgeVerdict
// ---------------------------------------------------------------------------

/// Outcome of validating a prospective blocking edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum EdgeVerdict {
    Accepted,
    SelfDependency { path: Vec<RecordId> },
    CycleRejected { path: Vec<RecordId> },
}

impl EdgeVerdict {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Offending path, empty when accepted.
    #[must_use]
    pub fn path(&self) -> &[RecordId] {
        match self {
            Self::Accepted => &[],
            Self::SelfDependency { path } | Self::CycleRejected { path } => path,
        }
    }
}

impl From<Option<CycleWarning>> for EdgeVerdict {
    fn from(warning: Option<CycleWarning>) -> Self {
        match warning {
            None => Self::Accepted,
            Some(w) if w.is_self_loop() => Self::SelfDependency { path: w.path },
            Some(w) => Self::CycleRejected { path: w.path },
        }
    }
}

// ---------------------------------------------------------------------------
// Write-path check
// ---------------------------------------------------------------------------

/// Check whether adding `source → target` would introduce a cycle.
///
/// Self-reference short-circuits to a one-element path. An edge that is
/// already present creates no *new* cycle, and endpoints unknown to the
/// graph can't close one.
#[must_use]
pub fn would_create_cycle(
    graph: &DependencyGraph,
    source: RecordId,
    target: RecordId,
) -> Option<CycleWarning> {
    if source == target {
        return Some(CycleWarning::self_loop(source));
    }

    let (Some(from), Some(to)) = (graph.node_index(source), graph.node_index(target)) else {
        return None;
    };

    if graph.graph.contains_edge(from, to) {
        return None;
    }

    // Depth-first from `target` looking for `source`.
    let mut stack: Vec<NodeIndex> = vec![to];
    let mut visited: HashSet<NodeIndex> = HashSet::from([to]);
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    while let Some(current) = stack.pop() {
        if current == from {
            return Some(CycleWarning {
                path: reconstruct_path(graph, from, to, &parent),
                source,
                target,
            });
        }

        // Push in descending order so the lowest id is explored first.
        for next in graph
            .sorted_neighbors(current, Direction::Outgoing)
            .into_iter()
            .rev()
        {
            if visited.insert(next) {
                parent.insert(next, current);
                stack.push(next);
            }
        }
    }

    None
}

/// [`would_create_cycle`] folded into an [`EdgeVerdict`].
#[must_use]
pub fn validate_edge(graph: &DependencyGraph, source: RecordId, target: RecordId) -> EdgeVerdict {
    would_create_cycle(graph, source, target).into()
}

fn reconstruct_path(
    graph: &DependencyGraph,
    from: NodeIndex,
    to: NodeIndex,
    parent: &HashMap<NodeIndex, NodeIndex>,
) -> Vec<RecordId> {
    // Parent links point back along the walk, so following them from
    // `from` yields the reversed walk: source, …, target.
    let mut chain: Vec<NodeIndex> = vec![from];
    let mut cursor = from;
    while cursor != to {
        let Some(&prev) = parent.get(&cursor) else {
            break;
        };
        cursor = prev;
        chain.push(cursor);
    }
    chain.push(from);

    chain
        .into_iter()
        .filter_map(|idx| graph.record_id(idx))
        .collect()
}

// ---------------------------------------------------------------------------
// Whole-graph checks
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find one cycle in an already-built graph.
///
/// Iterative white/gray/black walk: a gray neighbour is on the active path
/// and closes a cycle; a black one was fully explored and is skipped.
/// Starts are tried in ascending id order. The returned path is closed
/// (first element == last element).
#[must_use]
pub fn find_any_cycle(graph: &DependencyGraph) -> Option<Vec<RecordId>> {
    let g = &graph.graph;
    let mut color = vec![Color::White; g.node_count()];

    for start in g.node_indices() {
        if color[start.index()] != Color::White {
            continue;
        }

        // Frame: (node, sorted dependencies, next neighbour position).
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
            vec![(start, graph.sorted_neighbors(start, Direction::Outgoing), 0)];
        color[start.index()] = Color::Gray;

        while let Some(frame) = stack.last_mut() {
            let Some(&next) = frame.1.get(frame.2) else {
                color[frame.0.index()] = Color::Black;
                stack.pop();
                continue;
            };
            frame.2 += 1;

            match color[next.index()] {
                Color::White => {
                    color[next.index()] = Color::Gray;
                    stack.push((next, graph.sorted_neighbors(next, Direction::Outgoing), 0));
                }
                Color::Gray => {
                    let begin = stack.iter().position(|f| f.0 == next).unwrap_or(0);
                    let mut path: Vec<RecordId> = stack[begin..]
                        .iter()
                        .filter_map(|f| graph.record_id(f.0))
                        .collect();
                    path.extend(graph.record_id(next));
                    return Some(path);
                }
                Color::Black => {}
            }
        }
    }

    None
}

/// `true` when the graph contains any cycle.
#[must_use]
pub fn has_cycle(graph: &DependencyGraph) -> bool {
    find_any_cycle(graph).is_some()
}

/// Every cycle currently present, one sorted member list per strongly
/// connected component. Self-loops are one-element entries.
#[must_use]
pub fn find_all_cycles(graph: &DependencyGraph) -> Vec<Vec<RecordId>> {
    let g = &graph.graph;
    let mut cycles: Vec<Vec<RecordId>> = tarjan_scc(g)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| g.find_edge(node, node).is_some())
        })
        .map(|component| {
            let mut ids: Vec<RecordId> = component
                .into_iter()
                .filter_map(|idx| graph.record_id(idx))
                .collect();
            ids.sort_unstable();
            ids
        })
        .collect();

    cycles.sort_unstable();
    cycles
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
