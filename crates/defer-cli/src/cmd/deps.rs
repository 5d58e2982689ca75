//! `dfr deps`, `dfr unblocks`, `dfr chain` and `dfr blocked`.

use std::io::Write;

use clap::Args;
use defer_core::RecordId;
use defer_graph::views::{BlockedRecord, ChainLink};
use serde::Serialize;

use super::{Engine, IdArgs};
use crate::output::{OutputMode, id_list, render};

/// Arguments for `dfr deps`.
#[derive(Args, Debug, Clone)]
pub struct DepsArgs {
    /// Record id.
    pub id: RecordId,

    /// Follow dependencies all the way down.
    #[arg(long)]
    pub transitive: bool,

    /// List dependents (what waits on this record) instead.
    #[arg(long)]
    pub reverse: bool,
}

#[derive(Debug, Serialize)]
struct DepsOutput {
    id: RecordId,
    direction: &'static str,
    transitive: bool,
    records: Vec<RecordId>,
}

pub fn run_deps(args: &DepsArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let view = engine.view()?;
    let records = match (args.reverse, args.transitive) {
        (false, false) => view.direct_dependencies(args.id)?,
        (false, true) => view.transitive_dependencies(args.id)?,
        (true, true) => view.transitive_dependents(args.id)?,
        (true, false) => view.direct_dependents(args.id)?,
    };

    let payload = DepsOutput {
        id: args.id,
        direction: if args.reverse { "dependents" } else { "dependencies" },
        transitive: args.transitive,
        records,
    };
    render(output, &payload, |p, w| {
        writeln!(w, "{} {}: {}", p.id, p.direction, id_list(&p.records))
    })
}

#[derive(Debug, Serialize)]
struct UnblocksOutput {
    id: RecordId,
    unblocks: Vec<RecordId>,
}

pub fn run_unblocks(args: &IdArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let unblocks = engine.items_unblocked_by(args.id)?;
    let payload = UnblocksOutput {
        id: args.id,
        unblocks,
    };
    render(output, &payload, |p, w| {
        if p.unblocks.is_empty() {
            writeln!(w, "Completing {} unblocks nothing yet.", p.id)
        } else {
            writeln!(w, "Completing {} unblocks: {}", p.id, id_list(&p.unblocks))
        }
    })
}

pub fn run_chain(args: &IdArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let chain = engine.view()?.dependency_chain(args.id)?;
    render(output, &chain, |chain, w| render_chain_human(args.id, chain, w))
}

fn render_chain_human(id: RecordId, chain: &[ChainLink], w: &mut dyn Write) -> std::io::Result<()> {
    if chain.is_empty() {
        return writeln!(w, "{id} has no dependencies.");
    }
    writeln!(w, "{id}")?;
    for link in chain {
        writeln!(w, "{}└─ {}", "   ".repeat(link.distance - 1), link.id)?;
    }
    Ok(())
}

pub fn run_blocked(output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let blocked = engine.view()?.blocked_items();
    render(output, &blocked, |rows, w| render_blocked_human(rows, w))
}

fn render_blocked_human(rows: &[BlockedRecord], w: &mut dyn Write) -> std::io::Result<()> {
    if rows.is_empty() {
        return writeln!(w, "Nothing is blocked.");
    }
    for row in rows {
        writeln!(w, "{} waits on {}", row.id, id_list(&row.blockers))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: DepsArgs,
    }

    #[test]
    fn deps_args_parse_id_and_flags() {
        let parsed = Wrapper::parse_from(["test", "#12", "--transitive"]);
        assert_eq!(parsed.args.id, RecordId(12));
        assert!(parsed.args.transitive);
        assert!(!parsed.args.reverse);
    }

    #[test]
    fn deps_args_reject_zero_id() {
        assert!(Wrapper::try_parse_from(["test", "0"]).is_err());
    }

    #[test]
    fn chain_renders_indented_by_distance() {
        let chain = vec![
            ChainLink {
                id: RecordId(2),
                distance: 1,
            },
            ChainLink {
                id: RecordId(1),
                distance: 2,
            },
        ];
        let mut buf = Vec::new();
        render_chain_human(RecordId(3), &chain, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "3\n└─ 2\n   └─ 1\n");
    }

    #[test]
    fn blocked_renders_waits() {
        let rows = vec![BlockedRecord {
            id: RecordId(4),
            blockers: vec![RecordId(1), RecordId(2)],
        }];
        let mut buf = Vec::new();
        render_blocked_human(&rows, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "4 waits on 1 2\n");
    }
}
