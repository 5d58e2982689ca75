//! Edge classification.
//!
//! Exactly `blocks` and `parent-of` carry blocking semantics. Everything
//! downstream (cycle checks, ordering, blocked counts) sees only what passes
//! through here; informational links stay in the store and are still
//! returned by `Snapshot::relationships_of`.

use defer_core::{RelationKind, Relationship};

/// `true` when `kind` participates in cycle detection and ordering.
#[must_use]
pub const fn is_blocking_semantics(kind: RelationKind) -> bool {
    kind.is_blocking()
}

/// Keep only the blocking-semantic relationships.
pub fn blocking_relationships<'a, I>(relationships: I) -> impl Iterator<Item = &'a Relationship>
where
    I: IntoIterator<Item = &'a Relationship>,
{
    relationships
        .into_iter()
        .filter(|rel| is_blocking_semantics(rel.kind))
}
