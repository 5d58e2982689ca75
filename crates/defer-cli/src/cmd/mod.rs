//! Command handlers. Each takes parsed args, the output mode and an engine
//! over the resolved snapshot file.

pub mod deps;
pub mod link;
pub mod order;
pub mod record;
pub mod stats;

use clap::Args;
use defer_core::{FileStore, RecordId};
use defer_graph::GraphEngine;

/// Engine over the snapshot file selected by flags, env and config.
pub type Engine = GraphEngine<FileStore>;

/// A single record id argument.
#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    /// Record id (a leading `#` is accepted).
    pub id: RecordId,
}
