//! Dependency graph pipeline.
//!
//! - [`classify`]: which relationship kinds carry blocking semantics.
//! - [`build`]: snapshot → petgraph `DiGraph` with id ↔ index maps.
//! - [`cycles`]: write-path edge validation and whole-graph cycle search.
//! - [`order`]: Kahn resolution order and parallel layers.
//! - [`query`]: blockers, unblock impact, transitive closure, stats.
//!
//! Every function here is pure over a built [`DependencyGraph`].

pub mod build;
pub mod classify;
pub mod cycles;
pub mod order;
pub mod query;

pub use build::{DependencyGraph, content_fingerprint};
pub use classify::is_blocking_semantics;
pub use cycles::{CycleWarning, EdgeVerdict, find_all_cycles, find_any_cycle, validate_edge, would_create_cycle};
pub use order::{ResolutionOrder, resolution_layers, resolution_order};
pub use query::{GraphStats, RecordIndex, stats};
