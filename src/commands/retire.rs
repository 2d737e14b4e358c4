//! Retire command implementation

use std::path::PathBuf;

use inquire::Confirm;

use super::helpers;
use crate::cli::RetireArgs;
use crate::error::{OverlayError, Result};

/// Run retire command
pub fn run(workspace: Option<PathBuf>, args: RetireArgs) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;

    // Fail on unknown names before prompting
    let ledger = workspace.load_ledger()?;
    let extension = ledger.get(&args.name)?;
    if !extension.is_live() {
        return Err(OverlayError::ExtensionRetired {
            name: args.name.clone(),
        });
    }

    if !args.yes && !confirm_retire(&args.name)? {
        println!("Retire cancelled.");
        return Ok(());
    }

    workspace.update_ledger(|ledger| ledger.mark_retired(&args.name))?;
    println!(
        "Retired {}; it is no longer applied and its name stays reserved.",
        args.name
    );
    Ok(())
}

fn confirm_retire(name: &str) -> Result<bool> {
    Confirm::new(&format!("Retire extension '{name}'?"))
        .with_default(false)
        .with_help_message("Retired extensions are kept in the ledger but never applied again")
        .prompt()
        .map_err(|e| OverlayError::IoError {
            message: format!("Failed to read confirmation: {e}"),
        })
}
