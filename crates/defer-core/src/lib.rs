#![forbid(unsafe_code)]
//! defer-core library.
//!
//! Records, relationships, snapshots and the storage collaborator seam
//! consumed by the dependency graph engine in `defer-graph`.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums carrying an [`error::ErrorCode`];
//!   `anyhow::Result` for configuration loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod error;
pub mod lock;
pub mod model;
pub mod snapshot;
pub mod store;

pub use model::{Priority, Record, RecordId, RelationKind, Relationship, Status};
pub use snapshot::Snapshot;
pub use store::{FileStore, MemoryStore, RecordStore, StoreError};
