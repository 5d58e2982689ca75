//! Record and relationship types shared by the store and the graph engine.

pub mod record;

pub use record::{ParseEnumError, Priority, Record, RecordId, RelationKind, Relationship, Status};
