//! Remount command implementation

use std::path::PathBuf;

use super::helpers;
use crate::cli::RemountArgs;
use crate::error::Result;
use crate::schema::SchemaPath;

/// Run remount command
pub fn run(workspace: Option<PathBuf>, args: RemountArgs) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let mount = SchemaPath::parse(&args.path)?;

    workspace.update_ledger(|ledger| ledger.remount(&args.name, mount.clone()))?;
    println!(
        "Remounted {} to {mount}; it applies on the next 'overlay reconcile'.",
        args.name
    );
    Ok(())
}
