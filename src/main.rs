//! overlay - reconcile organization schema extensions with upstream releases
//!
//! An organization maintains fields of its own (extensions) mounted into an
//! externally versioned metadata schema. overlay records them in a ledger and
//! re-applies them to each new upstream release, following moved fields and
//! reporting everything that needs a human.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod artifact;
mod cache;
mod cli;
mod commands;
mod config;
mod diff;
mod error;
mod git;
mod hash;
mod ledger;
mod progress;
mod reconcile;
mod report;
mod schema;
mod transaction;
mod workspace;

#[cfg(test)]
mod test_fixtures;

use cli::{Cli, Commands};

/// Environment variable holding a log filter directive
const LOG_ENV: &str = "OVERLAY_LOG";

fn init_logging(verbose: bool) {
    let default = if verbose { "overlay=debug" } else { "overlay=info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let workspace = cli.workspace;
    let result = match cli.command {
        Commands::Init(args) => commands::init::run(workspace, args),
        Commands::Sync => commands::sync::run(workspace),
        Commands::Diff(args) => commands::diff::run(workspace, args),
        Commands::Reconcile(args) => commands::reconcile::run(workspace, args),
        Commands::List(args) => commands::list::run(workspace, args),
        Commands::Show(args) => commands::show::run(workspace, args),
        Commands::Retire(args) => commands::retire::run(workspace, args),
        Commands::Remount(args) => commands::remount::run(workspace, args),
        Commands::Check => commands::check::run(workspace),
        Commands::Tags => commands::tags::run(workspace),
        Commands::Cache(args) => commands::cache::run(args),
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if let Some(help) = miette::Diagnostic::help(&e) {
            eprintln!("  help: {help}");
        }
        std::process::exit(e.exit_code());
    }
}
