//! Check command implementation
//!
//! Every active extension applied against the ledger's base release must
//! still resolve in that release.

use std::path::PathBuf;

use console::Style;

use super::helpers;
use crate::error::{Result, config as config_error, ledger as ledger_error};

/// Run check command
pub fn run(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let ledger = workspace.load_ledger()?;
    if ledger.is_empty() {
        println!("No extensions to check.");
        return Ok(());
    }
    let base_tag = ledger
        .base_tag
        .clone()
        .ok_or_else(|| config_error::invalid("the ledger has no base tag"))?;

    let store = workspace.store()?;
    let artifact = helpers::fetch(&store, &base_tag, true)?;
    let inconsistencies = ledger.check(&artifact);

    if inconsistencies.is_empty() {
        println!(
            "{} Ledger is consistent with {base_tag}",
            Style::new().green().apply_to("✓")
        );
        return Ok(());
    }

    for inconsistency in &inconsistencies {
        println!("  {} {inconsistency}", Style::new().red().apply_to("✗"));
    }
    Err(ledger_error::inconsistent(base_tag, inconsistencies.len()))
}
