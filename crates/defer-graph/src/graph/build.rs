//! Graph construction from a snapshot of records and relationships.
//!
//! # Edge Direction
//!
//! An edge `A → B` means "A depends on B": B must complete before A. This
//! matches the stored relationship `A blocks B` / `A parent-of B`, so the
//! forward adjacency of a node lists its dependencies and the reverse
//! adjacency lists its dependents.
//!
//! # Dangling Edges
//!
//! A relationship whose endpoint is not among the records (deleted between
//! listing edges and listing records) is dropped and counted in
//! [`DependencyGraph::dropped_edges`].
//!
//! # Cache Invalidation
//!
//! [`DependencyGraph::content_hash`] is a BLAKE3 hash of the node set and
//! the retained edge set. [`content_fingerprint`] computes the same value
//! without building the graph.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeSet, HashMap};

use defer_core::{Record, RecordId, Relationship, Snapshot};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, instrument};

use super::classify::blocking_relationships;

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Blocking-semantic dependency graph over one snapshot.
///
/// Nodes are record ids, added in ascending id order, so `NodeIndex` order
/// and id order agree. Duplicate edges between the same ordered pair (for
/// example both `blocks` and `parent-of`) collapse into one edge.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Directed graph: edge `a → b` = `a` depends on `b`.
    pub graph: DiGraph<RecordId, ()>,
    /// Mapping from record id to `NodeIndex`.
    pub node_map: HashMap<RecordId, NodeIndex>,
    /// BLAKE3 hash of nodes and retained edges.
    pub content_hash: String,
    /// Number of blocking relationships dropped because an endpoint was missing.
    pub dropped_edges: usize,
}

impl DependencyGraph {
    /// Build the graph from `records` and `relationships`.
    ///
    /// Informational relationships are ignored. Each call produces an
    /// independent structure; nothing is shared with earlier builds.
    #[must_use]
    #[instrument(skip_all, fields(records = records.len(), relationships = relationships.len()))]
    pub fn build(records: &[Record], relationships: &[Relationship]) -> Self {
        let Retained {
            ids,
            edges,
            dropped,
        } = retain(records, relationships);

        let mut graph = DiGraph::<RecordId, ()>::with_capacity(ids.len(), edges.len());
        let mut node_map: HashMap<RecordId, NodeIndex> = HashMap::with_capacity(ids.len());

        for &id in &ids {
            node_map.insert(id, graph.add_node(id));
        }

        for &(source, target) in &edges {
            // Both endpoints were checked by `retain`.
            if let (Some(&a), Some(&b)) = (node_map.get(&source), node_map.get(&target)) {
                graph.add_edge(a, b, ());
            }
        }

        if dropped > 0 {
            debug!(dropped, "dropped dangling blocking relationships");
        }

        Self {
            content_hash: compute_hash(&ids, &edges),
            graph,
            node_map,
            dropped_edges: dropped,
        }
    }

    /// Build from a whole snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self::build(&snapshot.records, &snapshot.relationships)
    }

    /// Number of nodes (records).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct blocking edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.node_map.contains_key(&id)
    }

    #[must_use]
    pub fn node_index(&self, id: RecordId) -> Option<NodeIndex> {
        self.node_map.get(&id).copied()
    }

    #[must_use]
    pub fn record_id(&self, idx: NodeIndex) -> Option<RecordId> {
        self.graph.node_weight(idx).copied()
    }

    /// All record ids, ascending.
    #[must_use]
    pub fn record_ids(&self) -> Vec<RecordId> {
        // Nodes were inserted in ascending order.
        self.graph
            .node_indices()
            .filter_map(|idx| self.record_id(idx))
            .collect()
    }

    /// Forward adjacency: what `id` depends on, ascending.
    #[must_use]
    pub fn dependencies(&self, id: RecordId) -> Vec<RecordId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Reverse adjacency: what depends on `id`, ascending.
    #[must_use]
    pub fn dependents(&self, id: RecordId) -> Vec<RecordId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Sorted neighbour indices of `idx`. Sorting by index is sorting by id.
    pub(crate) fn sorted_neighbors(&self, idx: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        out.sort_unstable();
        out
    }

    fn neighbors(&self, id: RecordId, dir: Direction) -> Vec<RecordId> {
        let Some(idx) = self.node_index(id) else {
            return Vec::new();
        };
        self.sorted_neighbors(idx, dir)
            .into_iter()
            .filter_map(|n| self.record_id(n))
            .collect()
    }
}

/// Content hash a snapshot would produce, without building the graph.
#[must_use]
pub fn content_fingerprint(snapshot: &Snapshot) -> String {
    let retained = retain(&snapshot.records, &snapshot.relationships);
    compute_hash(&retained.ids, &retained.edges)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct Retained {
    ids: Vec<RecordId>,
    edges: Vec<(RecordId, RecordId)>,
    dropped: usize,
}

/// Sorted unique node ids and sorted unique blocking edges between them.
fn retain(records: &[Record], relationships: &[Relationship]) -> Retained {
    let ids: BTreeSet<RecordId> = records.iter().map(|r| r.id).collect();

    let mut dropped = 0;
    let mut edges: BTreeSet<(RecordId, RecordId)> = BTreeSet::new();
    for rel in blocking_relationships(relationships) {
        if ids.contains(&rel.source) && ids.contains(&rel.target) {
            edges.insert((rel.source, rel.target));
        } else {
            dropped += 1;
        }
    }

    Retained {
        ids: ids.into_iter().collect(),
        edges: edges.into_iter().collect(),
        dropped,
    }
}

fn compute_hash(ids: &[RecordId], edges: &[(RecordId, RecordId)]) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in ids {
        hasher.update(&id.get().to_le_bytes());
    }
    hasher.update(b"\x00edges\x00");
    for (source, target) in edges {
        hasher.update(&source.get().to_le_bytes());
        hasher.update(&target.get().to_le_bytes());
    }
    format!("blake3:{}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use defer_core::RelationKind;

    fn records(ids: &[u64]) -> Vec<Record> {
        ids.iter().copied().map(Record::new).collect()
    }

    #[test]
    fn empty_input_produces_empty_graph() {
        let graph = DependencyGraph::build(&[], &[]);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.content_hash.starts_with("blake3:"));
    }

    #[test]
    fn records_without_links_are_nodes_only() {
        let graph = DependencyGraph::build(&records(&[1, 2]), &[]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.contains(RecordId(1)));
        assert!(graph.dependencies(RecordId(1)).is_empty());
    }

    #[test]
    fn edge_direction_is_dependent_to_dependency() {
        let graph = DependencyGraph::build(&records(&[1, 2]), &[Relationship::blocks(2, 1)]);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dependencies(RecordId(2)), vec![RecordId(1)]);
        assert_eq!(graph.dependents(RecordId(1)), vec![RecordId(2)]);
        assert!(graph.dependencies(RecordId(1)).is_empty());
    }

    #[test]
    fn informational_links_are_not_edges() {
        let rels = vec![
            Relationship::new(1, 2, RelationKind::RelatesTo),
            Relationship::new(2, 1, RelationKind::RelatesTo),
            Relationship::new(1, 2, RelationKind::Duplicates),
        ];
        let graph = DependencyGraph::build(&records(&[1, 2]), &rels);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.dropped_edges, 0);
    }

    #[test]
    fn parent_of_counts_like_blocks() {
        let rels = vec![Relationship::new(3, 1, RelationKind::ParentOf)];
        let graph = DependencyGraph::build(&records(&[1, 3]), &rels);
        assert_eq!(graph.dependencies(RecordId(3)), vec![RecordId(1)]);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let rels = vec![
            Relationship::blocks(2, 1),
            Relationship::new(2, 1, RelationKind::ParentOf),
            Relationship::blocks(2, 1),
        ];
        let graph = DependencyGraph::build(&records(&[1, 2]), &rels);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn dangling_edges_are_dropped_silently() {
        let rels = vec![Relationship::blocks(2, 1), Relationship::blocks(3, 99)];
        let graph = DependencyGraph::build(&records(&[1, 2, 3]), &rels);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dropped_edges, 1);
        assert!(!graph.contains(RecordId(99)));
    }

    #[test]
    fn neighbours_come_back_ascending() {
        let rels = vec![
            Relationship::blocks(9, 5),
            Relationship::blocks(9, 1),
            Relationship::blocks(9, 7),
        ];
        let graph = DependencyGraph::build(&records(&[9, 7, 5, 1]), &rels);
        assert_eq!(
            graph.dependencies(RecordId(9)),
            vec![RecordId(1), RecordId(5), RecordId(7)]
        );
        assert_eq!(
            graph.record_ids(),
            vec![RecordId(1), RecordId(5), RecordId(7), RecordId(9)]
        );
    }

    #[test]
    fn content_hash_tracks_edges_not_order() {
        let base = DependencyGraph::build(&records(&[1, 2, 3]), &[]).content_hash;

        let a = DependencyGraph::build(
            &records(&[1, 2, 3]),
            &[Relationship::blocks(2, 1), Relationship::blocks(3, 2)],
        );
        let b = DependencyGraph::build(
            &records(&[3, 2, 1]),
            &[Relationship::blocks(3, 2), Relationship::blocks(2, 1)],
        );

        assert_ne!(base, a.content_hash, "hash must change when edges change");
        assert_eq!(a.content_hash, b.content_hash, "input order is irrelevant");
    }

    #[test]
    fn fingerprint_matches_built_hash() {
        let snapshot = Snapshot::new(
            records(&[1, 2, 3]),
            vec![
                Relationship::blocks(2, 1),
                Relationship::new(3, 1, RelationKind::RelatesTo),
                Relationship::blocks(3, 42),
            ],
        );
        let graph = DependencyGraph::from_snapshot(&snapshot);
        assert_eq!(content_fingerprint(&snapshot), graph.content_hash);
    }

    #[test]
    fn builds_are_independent() {
        let first = DependencyGraph::build(&records(&[1, 2]), &[Relationship::blocks(2, 1)]);
        let second = DependencyGraph::build(&records(&[1, 2]), &[]);
        assert_eq!(first.edge_count(), 1);
        assert_eq!(second.edge_count(), 0, "no edges leak from an earlier build");
    }
}
