//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// overlay - reconcile organization extensions with upstream schema releases
///
/// Keeps a ledger of organization-owned fields mounted into an upstream
/// metadata schema and re-applies them to every new upstream release.
#[derive(Parser, Debug)]
#[command(
    name = "overlay",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Reconcile organization schema extensions with upstream releases",
    long_about = "overlay keeps a ledger of organization-owned fields mounted into an upstream \
                  metadata schema. When upstream publishes a new release, overlay diffs it \
                  against the release the ledger was applied to and re-applies every extension, \
                  following moved fields and reporting what needs a human.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  overlay init v11.0.0\n    \
                  overlay diff v11.0.0 v12.0.0\n    \
                  overlay reconcile v12.0.0 --dry-run\n    \
                  overlay reconcile v12.0.0 --report report.json\n    \
                  overlay remount grant_id metadata.award.grant_id"
)]
pub struct Cli {
    /// Workspace directory (defaults to the nearest directory with overlay.yaml)
    #[arg(long, short = 'w', global = true, env = "OVERLAY_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the ledger from overlay.yaml against an upstream tag
    Init(InitArgs),

    /// Add extensions defined in overlay.yaml but missing from the ledger
    Sync,

    /// Show upstream changes between two tags
    Diff(DiffArgs),

    /// Re-apply every extension against a new upstream tag
    Reconcile(ReconcileArgs),

    /// List extensions in the ledger
    List(ListArgs),

    /// Show one extension
    Show(ShowArgs),

    /// Stop applying an extension (its name stays reserved)
    Retire(RetireArgs),

    /// Move an extension to a new mount point
    Remount(RemountArgs),

    /// Verify that every applied extension resolves in the ledger's base tag
    Check,

    /// List upstream tags
    Tags,

    /// Manage the artifact cache
    Cache(CacheArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the init command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Start tracking against a release:\n    overlay init v11.0.0")]
pub struct InitArgs {
    /// Upstream tag the extensions are currently applied to
    pub tag: String,
}

/// Arguments for the diff command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Show changes between releases:\n    overlay diff v11.0.0 v12.0.0\n\n\
                  Machine-readable output:\n    overlay diff v11.0.0 v12.0.0 --json")]
pub struct DiffArgs {
    /// Old upstream tag
    pub old: String,

    /// New upstream tag
    pub new: String,

    /// Print the delta as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the reconcile command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Preview a reconciliation:\n    overlay reconcile v12.0.0 --dry-run\n\n\
                  Fail unless every extension applies:\n    overlay reconcile v12.0.0 --require-total\n\n\
                  Write the audit report and merged schema:\n    overlay reconcile v12.0.0 --report report.json --merged merged.yaml\n\n\
                  Exit codes: 0 merged, 2 conflicts left, 3 upstream unavailable or malformed, 1 other errors")]
pub struct ReconcileArgs {
    /// Upstream tag to reconcile against
    pub tag: String,

    /// Show what would happen without committing the ledger
    #[arg(long)]
    pub dry_run: bool,

    /// Fail, committing nothing, if any extension conflicts
    #[arg(long)]
    pub require_total: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the JSON report to a file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Write the merged schema to a file
    #[arg(long, value_name = "FILE")]
    pub merged: Option<PathBuf>,

    /// Override reconcile.move_threshold for this run
    #[arg(long, value_name = "CONFIDENCE")]
    pub move_threshold: Option<f64>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  List live extensions:\n    overlay list\n\n\
                  Include retired extensions:\n    overlay list --all")]
pub struct ListArgs {
    /// Include retired extensions
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Extension name
    pub name: String,
}

/// Arguments for the retire command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Retire an extension:\n    overlay retire county_code\n\n\
                  Retire without confirmation:\n    overlay retire county_code -y")]
pub struct RetireArgs {
    /// Extension name
    pub name: String,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Arguments for the remount command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Follow a rename reported as a conflict:\n    overlay remount grant_id metadata.award.grant_id")]
pub struct RemountArgs {
    /// Extension name
    pub name: String,

    /// New mount point (dot-separated path)
    pub path: String,
}

/// Arguments for the cache command; statistics when no subcommand is given
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: Option<CacheCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// List cached upstream sources
    List,

    /// Remove cached artifacts and clones
    Clear {
        /// Source slug to remove; everything when omitted
        slug: Option<String>,
    },
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    overlay completions --shell bash > ~/.bash_completion.d/overlay\n\n\
                  Generate zsh completions:\n    overlay completions --shell zsh > ~/.zfunc/_overlay")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long)]
    pub shell: String,
}
