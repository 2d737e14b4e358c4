//! Diff command implementation

use std::path::PathBuf;

use super::helpers;
use crate::cli::DiffArgs;
use crate::diff;
use crate::error::Result;
use crate::report::narrative;

/// Run diff command
pub fn run(workspace: Option<PathBuf>, args: DiffArgs) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let store = workspace.store()?;

    let (old, new) = helpers::fetch_pair(&store, &args.old, &args.new, !args.json)?;
    let delta = diff::diff(&old, &new, &workspace.config.diff_options());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&delta)?);
    } else {
        print!("{}", narrative::delta(&delta));
    }
    Ok(())
}
