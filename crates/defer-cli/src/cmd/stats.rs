//! `dfr stats` and `dfr cycles`.

use std::io::Write;

use defer_core::RecordId;
use defer_graph::GraphStats;
use serde::Serialize;

use super::Engine;
use crate::output::{OutputMode, id_list, pretty_kv, pretty_section, render};

#[derive(Debug, Serialize)]
struct StatsOutput {
    #[serde(flatten)]
    stats: GraphStats,
    has_cycles: bool,
}

pub fn run_stats(output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let view = engine.view()?;
    let payload = StatsOutput {
        stats: view.stats(),
        has_cycles: view.find_any_cycle().is_some(),
    };
    render(output, &payload, |p, w| render_stats_human(p, w))
}

fn render_stats_human(p: &StatsOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Dependency graph")?;
    pretty_kv(w, "Records", p.stats.total_items.to_string())?;
    pretty_kv(w, "Blocking links", p.stats.edge_count.to_string())?;
    pretty_kv(w, "With dependencies", p.stats.items_with_dependencies.to_string())?;
    pretty_kv(w, "Blocked", p.stats.blocked_items.to_string())?;
    pretty_kv(w, "Max depth", p.stats.max_depth.to_string())?;
    if p.has_cycles {
        writeln!(w, "\nStored data contains a dependency cycle; run `dfr cycles`.")?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CyclesOutput {
    cycles: Vec<Vec<RecordId>>,
}

pub fn run_cycles(output: OutputMode, engine: &Engine) -> anyhow::Result<()> {
    let payload = CyclesOutput {
        cycles: engine.view()?.find_all_cycles(),
    };
    render(output, &payload, |p, w| render_cycles_human(p, w))
}

fn render_cycles_human(payload: &CyclesOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if payload.cycles.is_empty() {
        return writeln!(w, "No dependency cycles found.");
    }
    writeln!(w, "Dependency cycles ({})", payload.cycles.len())?;
    for (idx, cycle) in payload.cycles.iter().enumerate() {
        writeln!(w, "  {}: {}", idx + 1, id_list(cycle))?;
    }
    Ok(())
}
