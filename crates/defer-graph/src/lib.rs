#![forbid(unsafe_code)]
//! defer-graph library.
//!
//! Dependency graph engine for deferred records: which relationships block,
//! which new edges would close a loop, what order work resolves in, and
//! what is blocked on what.
//!
//! # Module Layout
//!
//! - [`graph`]: pure algorithms over a built [`graph::DependencyGraph`].
//! - [`views`]: ranked order, blocked items and dependency chains.
//! - [`cache`]: graph reuse keyed by snapshot version.
//! - [`engine`]: [`GraphEngine`], the store-backed read and write paths.

pub mod cache;
pub mod engine;
pub mod graph;
pub mod views;

pub use engine::{EngineError, GraphEngine, GraphView, LinkOutcome};
pub use graph::{
    CycleWarning, DependencyGraph, EdgeVerdict, GraphStats, ResolutionOrder, resolution_order,
    would_create_cycle,
};
