//! `dfr check`, `dfr link` and `dfr unlink`.

use std::io::Write;

use clap::Args;
use defer_core::{RecordId, RelationKind, Relationship};
use defer_graph::{EdgeVerdict, LinkOutcome};
use serde::Serialize;

use super::Engine;
use crate::output::{OutputMode, render};

/// `<source> <target>` pair. For blocking kinds the source depends on the
/// target.
#[derive(Args, Debug, Clone)]
pub struct EdgeArgs {
    /// Dependent record.
    pub source: RecordId,
    /// Record it depends on.
    pub target: RecordId,
}

/// Arguments for `dfr link` and `dfr unlink`.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    #[command(flatten)]
    pub edge: EdgeArgs,

    /// Relationship kind: blocks, parent-of, relates-to, duplicates.
    #[arg(long, default_value = "blocks")]
    pub kind: RelationKind,
}

impl LinkArgs {
    const fn relationship(&self) -> Relationship {
        Relationship {
            source: self.edge.source,
            target: self.edge.target,
            kind: self.kind,
        }
    }
}

/// `dfr check` exits non-zero on rejection so scripts can gate on it.
pub fn run_check(args: &EdgeArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let verdict = engine.validate_edge(args.source, args.target)?;
    render(output, &verdict, |v, w| render_verdict_human(args, v, w))?;
    if verdict.is_accepted() {
        Ok(())
    } else {
        anyhow::bail!("{} → {} rejected", args.source, args.target)
    }
}

fn render_verdict_human(args: &EdgeArgs, verdict: &EdgeVerdict, w: &mut dyn Write) -> std::io::Result<()> {
    match verdict {
        EdgeVerdict::Accepted => writeln!(w, "ok: {} may depend on {}", args.source, args.target),
        EdgeVerdict::SelfDependency { .. } => {
            writeln!(w, "rejected: {} cannot depend on itself", args.source)
        }
        EdgeVerdict::CycleRejected { path } => {
            let loop_text = path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" → ");
            writeln!(w, "rejected: adding this would create a loop: {loop_text}")
        }
    }
}

#[derive(Debug, Serialize)]
struct LinkOutput {
    relationship: Relationship,
    #[serde(flatten)]
    outcome: LinkOutcome,
}

pub fn run_link(args: &LinkArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let relationship = args.relationship();
    let outcome = engine.add_relationship(relationship)?;
    let payload = LinkOutput {
        relationship,
        outcome,
    };
    render(output, &payload, |p, w| {
        if p.outcome.inserted {
            writeln!(w, "linked: {}", p.relationship)?;
        } else {
            writeln!(w, "already linked: {}", p.relationship)?;
        }
        if let Some(cycle) = &p.outcome.cycle {
            writeln!(w, "warning: {cycle}")?;
        }
        Ok(())
    })
}

#[derive(Debug, Serialize)]
struct UnlinkOutput {
    removed: Relationship,
}

pub fn run_unlink(args: &LinkArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let removed = args.relationship();
    engine.remove_relationship(removed)?;
    render(output, &UnlinkOutput { removed }, |p, w| {
        writeln!(w, "unlinked: {}", p.removed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: LinkArgs,
    }

    #[test]
    fn link_defaults_to_blocks() {
        let parsed = Wrapper::parse_from(["test", "3", "1"]);
        assert_eq!(parsed.args.relationship(), Relationship::blocks(3, 1));
    }

    #[test]
    fn link_accepts_kind_spellings() {
        let parsed = Wrapper::parse_from(["test", "3", "1", "--kind", "parent_of"]);
        assert_eq!(parsed.args.kind, RelationKind::ParentOf);
        assert!(Wrapper::try_parse_from(["test", "3", "1", "--kind", "follows"]).is_err());
    }

    #[test]
    fn verdict_text_shows_loop() {
        let args = EdgeArgs {
            source: RecordId(1),
            target: RecordId(3),
        };
        let verdict = EdgeVerdict::CycleRejected {
            path: vec![RecordId(1), RecordId(2), RecordId(3), RecordId(1)],
        };
        let mut buf = Vec::new();
        render_verdict_human(&args, &verdict, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "rejected: adding this would create a loop: 1 → 2 → 3 → 1\n"
        );
    }
}
