//! `dfr add`, `dfr status` and `dfr delete`.

use clap::Args;
use defer_core::{Priority, Record, RecordId, Relationship, Status};
use serde::Serialize;

use super::{Engine, IdArgs};
use crate::output::{OutputMode, render};

/// Arguments for `dfr add`.
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// New record id.
    pub id: RecordId,

    #[arg(long, short)]
    pub title: Option<String>,

    /// low, medium or high.
    #[arg(long, short, default_value = "medium")]
    pub priority: Priority,
}

/// Arguments for `dfr status`.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    pub id: RecordId,
    /// pending, in-progress, done or archived.
    pub status: Status,
}

pub fn run_add(args: &AddArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let record = Record::new(args.id)
        .with_priority(args.priority)
        .with_title(args.title.clone().unwrap_or_default());
    engine.insert_record(record.clone())?;
    render(output, &record, |r, w| writeln!(w, "added: {}", r.id))
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    id: RecordId,
    status: Status,
    unblocked: Vec<RecordId>,
}

pub fn run_status(args: &StatusArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let unblocked = engine.set_status(args.id, args.status)?;

    let payload = StatusOutput {
        id: args.id,
        status: args.status,
        unblocked,
    };
    render(output, &payload, |p, w| {
        writeln!(w, "{}: {}", p.id, p.status)?;
        for id in &p.unblocked {
            writeln!(w, "  now unblocked: {id}")?;
        }
        Ok(())
    })
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    id: RecordId,
    removed_relationships: Vec<Relationship>,
}

pub fn run_delete(args: &IdArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let removed_relationships = engine.delete_record(args.id)?;
    let payload = DeleteOutput {
        id: args.id,
        removed_relationships,
    };
    render(output, &payload, |p, w| {
        writeln!(
            w,
            "deleted: {} ({} relationships removed)",
            p.id,
            p.removed_relationships.len()
        )
    })
}
