//! `dfr order` and `dfr ranked`.

use std::io::Write;

use clap::Args;
use defer_core::config::RankingConfig;
use defer_core::RecordId;
use defer_graph::ResolutionOrder;
use defer_graph::views::{RankedRecord, ranked_order};
use serde::Serialize;

use super::Engine;
use crate::output::{OutputMode, id_list, pretty_section, render, render_mode};

/// Arguments for `dfr order`.
#[derive(Args, Debug, Default)]
pub struct OrderArgs {
    /// Group records into layers that can be worked in parallel.
    #[arg(long)]
    pub layers: bool,
}

/// Arguments for `dfr ranked`.
#[derive(Args, Debug, Default)]
pub struct RankedArgs {
    /// Include done and archived records.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct LayersOutput {
    layers: Vec<Vec<RecordId>>,
}

pub fn run_order(args: &OrderArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let view = engine.view()?;

    if args.layers {
        let payload = LayersOutput {
            layers: view.resolution_layers(),
        };
        return render(output, &payload, |p, w| {
            for (i, layer) in p.layers.iter().enumerate() {
                writeln!(w, "{i}: {}", id_list(layer))?;
            }
            Ok(())
        });
    }

    let order = view.resolution_order();
    render_mode(output, &order, render_order_text, render_order_pretty)
}

fn render_order_text(order: &ResolutionOrder, w: &mut dyn Write) -> std::io::Result<()> {
    for id in &order.order {
        if order.unresolved.contains(id) {
            writeln!(w, "{id}\tunresolved")?;
        } else {
            writeln!(w, "{id}")?;
        }
    }
    Ok(())
}

fn render_order_pretty(order: &ResolutionOrder, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Resolution order ({})", order.len()))?;
    for (i, id) in order.order.iter().enumerate() {
        let flag = if order.unresolved.contains(id) {
            "  (unresolved: dependency cycle)"
        } else {
            ""
        };
        writeln!(w, "{:>4}. {id}{flag}", i + 1)?;
    }
    if !order.is_complete() {
        writeln!(w, "\nRun `dfr cycles` to see the loops.")?;
    }
    Ok(())
}

pub fn run_ranked(args: &RankedArgs, output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let view = engine.view()?;
    let rows = if args.all {
        let config = RankingConfig {
            include_completed: true,
            ..engine.ranking().clone()
        };
        ranked_order(&view.resolution_order(), view.graph(), &view.records(), &config)
    } else {
        view.ranked_order()
    };

    render(output, &rows, |rows, w| render_ranked_human(rows, w))
}

fn render_ranked_human(rows: &[RankedRecord], w: &mut dyn Write) -> std::io::Result<()> {
    if rows.is_empty() {
        return writeln!(w, "Nothing to do.");
    }
    writeln!(w, "{:>6}  {:<8} {:<12} {:>8}", "id", "priority", "status", "blockers")?;
    for row in rows {
        let marker = if row.unresolved { " !" } else { "" };
        writeln!(
            w,
            "{:>6}  {:<8} {:<12} {:>8}{marker}",
            row.id,
            row.priority.to_string(),
            row.status.to_string(),
            row.blockers
        )?;
    }
    Ok(())
}
