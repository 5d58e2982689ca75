#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use defer_core::FileStore;
use defer_core::config::{EffectiveConfig, resolve_config};
use defer_graph::GraphEngine;
use output::{CliError, OutputMode, render_error};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "dfr",
    author,
    version,
    about = "defer: dependency graph for deferred records",
    long_about = None
)]
struct Cli {
    /// Enable debug logging for defer crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Snapshot file (overrides DEFER_SNAPSHOT and config).
    #[arg(long, global = true, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "Show the resolution order",
        after_help = "EXAMPLES:\n    dfr order\n    dfr order --layers --json"
    )]
    Order(cmd::order::OrderArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the order ranked by blocked state and priority"
    )]
    Ranked(cmd::order::RankedArgs),

    #[command(
        next_help_heading = "Read",
        about = "List what a record depends on",
        after_help = "EXAMPLES:\n    dfr deps 12\n    dfr deps 12 --transitive\n    dfr deps 12 --reverse"
    )]
    Deps(cmd::deps::DepsArgs),

    #[command(
        next_help_heading = "Read",
        about = "List records that completing this one would unblock"
    )]
    Unblocks(cmd::IdArgs),

    #[command(next_help_heading = "Read", about = "List blocked records and their blockers")]
    Blocked,

    #[command(
        next_help_heading = "Read",
        about = "Show every transitive dependency with its distance"
    )]
    Chain(cmd::IdArgs),

    #[command(next_help_heading = "Read", about = "Show dependency graph statistics")]
    Stats,

    #[command(next_help_heading = "Read", about = "List dependency cycles in stored data")]
    Cycles,

    #[command(
        next_help_heading = "Links",
        about = "Check whether <source> may depend on <target>",
        after_help = "Exits non-zero when the link would be rejected."
    )]
    Check(cmd::link::EdgeArgs),

    #[command(
        next_help_heading = "Links",
        about = "Add a relationship",
        after_help = "EXAMPLES:\n    # 3 cannot start until 1 is done\n    dfr link 3 1\n\n    dfr link 3 1 --kind relates-to"
    )]
    Link(cmd::link::LinkArgs),

    #[command(next_help_heading = "Links", about = "Remove a relationship")]
    Unlink(cmd::link::LinkArgs),

    #[command(next_help_heading = "Records", about = "Add a record")]
    Add(cmd::record::AddArgs),

    #[command(next_help_heading = "Records", about = "Change a record's status")]
    Status(cmd::record::StatusArgs),

    #[command(
        next_help_heading = "Records",
        about = "Delete a record and its relationships"
    )]
    Delete(cmd::IdArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DEFER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "defer=debug,info"
        } else {
            "defer=info,warn"
        })
    });

    let format = env::var("DEFER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_engine(config: &EffectiveConfig) -> cmd::Engine {
    let store = FileStore::new(
        &config.snapshot_path,
        Duration::from_millis(config.project.store.lock_timeout_ms),
    );
    GraphEngine::with_config(store, &config.project)
}

fn run(cli: &Cli, output: OutputMode, engine: &cmd::Engine) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Order(args) => cmd::order::run_order(args, output, engine),
        Commands::Ranked(args) => cmd::order::run_ranked(args, output, engine),
        Commands::Deps(args) => cmd::deps::run_deps(args, output, engine),
        Commands::Unblocks(args) => cmd::deps::run_unblocks(args, output, engine),
        Commands::Blocked => cmd::deps::run_blocked(output, engine),
        Commands::Chain(args) => cmd::deps::run_chain(args, output, engine),
        Commands::Stats => cmd::stats::run_stats(output, engine),
        Commands::Cycles => cmd::stats::run_cycles(output, engine),
        Commands::Check(args) => cmd::link::run_check(args, output, engine),
        Commands::Link(args) => cmd::link::run_link(args, output, engine),
        Commands::Unlink(args) => cmd::link::run_unlink(args, output, engine),
        Commands::Add(args) => cmd::record::run_add(args, output, engine),
        Commands::Status(args) => cmd::record::run_status(args, output, engine),
        Commands::Delete(args) => cmd::record::run_delete(args, output, engine),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: cannot read current directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    let fallback = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    };
    let config = match resolve_config(&project_root, cli.json, cli.snapshot.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            let mut cli_err = CliError::from(&err);
            cli_err.error_code = Some(defer_core::error::ErrorCode::ConfigParseError.code().to_string());
            let _ = render_error(fallback, &cli_err);
            return ExitCode::FAILURE;
        }
    };
    debug!(snapshot = %config.snapshot_path.display(), output = %config.resolved_output, "resolved config");

    let output = OutputMode::from_resolved(&config.resolved_output);
    let engine = open_engine(&config);

    match run(&cli, output, &engine) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = render_error(output, &CliError::from(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use defer_core::RecordId;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["dfr", "stats", "--json", "--snapshot", "/tmp/s.json"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.snapshot, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Commands::Stats));
    }

    #[test]
    fn chain_takes_an_id() {
        let cli = Cli::try_parse_from(["dfr", "chain", "5"]).unwrap();
        let Commands::Chain(args) = cli.command else {
            panic!("expected chain");
        };
        assert_eq!(args.id, RecordId(5));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["dfr"]).is_err());
    }
}
