//! Sync command implementation
//!
//! Adds definitions from `overlay.yaml` that the ledger does not know yet.
//! They stay pending until the next reconciliation applies them. Definitions
//! already in the ledger are never rewritten; the ledger is authoritative.

use std::path::PathBuf;

use console::Style;
use tracing::warn;

use super::helpers;
use crate::config::OverlayConfig;
use crate::error::Result;
use crate::ledger::OverlayLedger;

/// Run sync command
pub fn run(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let config = &workspace.config;

    let (added, drifted) = workspace.update_ledger(|ledger| sync_ledger(config, ledger))?;

    for name in &drifted {
        warn!(extension = %name, "definition differs from the ledger; keeping the ledger entry");
        println!(
            "  {} {name} differs from overlay.yaml (ledger kept; use remount or retire)",
            Style::new().yellow().apply_to("!")
        );
    }

    if added.is_empty() {
        println!("Ledger already has every extension in overlay.yaml.");
    } else {
        for name in &added {
            println!("  {} {name}", Style::new().green().apply_to("+"));
        }
        println!(
            "Added {} extension(s); they apply on the next 'overlay reconcile'.",
            added.len()
        );
    }
    Ok(())
}

/// Add unknown definitions to `ledger`
///
/// Returns the names added and the names whose definition no longer matches
/// the ledger entry.
fn sync_ledger(
    config: &OverlayConfig,
    ledger: &mut OverlayLedger,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut added = Vec::new();
    let mut drifted = Vec::new();

    for def in &config.extensions {
        match ledger.get(&def.name) {
            Ok(existing) => {
                if existing.kind != def.kind || existing.field != def.field {
                    drifted.push(def.name.clone());
                }
            }
            Err(_) => {
                ledger.add_extension(def.to_extension())?;
                added.push(def.name.clone());
            }
        }
    }
    Ok((added, drifted))
}
