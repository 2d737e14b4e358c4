//! List command implementation
//!
//! Lists ledger extensions in insertion order with their mount point, kind
//! and status. Retired extensions are hidden unless `--all` is given.

use std::path::PathBuf;

use console::Style;

use super::helpers;
use crate::cli::ListArgs;
use crate::error::Result;
use crate::ledger::{Extension, ExtensionStatus, OverlayLedger};

/// Run list command
pub fn run(workspace: Option<PathBuf>, args: ListArgs) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let ledger = workspace.load_ledger()?;
    print!("{}", render(&ledger, args.all));
    Ok(())
}

fn render(ledger: &OverlayLedger, all: bool) -> String {
    let extensions: Vec<&Extension> = ledger
        .list_extensions()
        .iter()
        .filter(|e| all || e.is_live())
        .collect();

    let base = ledger.base_tag.as_deref().unwrap_or("-");
    let mut out = format!(
        "{} (base {}, revision {})\n",
        Style::new().bold().apply_to("Extensions"),
        base,
        ledger.revision
    );

    if extensions.is_empty() {
        out.push_str("  No extensions.\n");
        return out;
    }

    let name_width = extensions.iter().map(|e| e.name.len()).max().unwrap_or(0);
    let mount_width = extensions
        .iter()
        .map(|e| e.mount.to_string().len())
        .max()
        .unwrap_or(0);

    for extension in extensions {
        out.push_str(&format!(
            "  {:<name_width$}  {:<mount_width$}  {:<8}  {}\n",
            Style::new().bold().yellow().apply_to(&extension.name),
            extension.mount.to_string(),
            extension.kind.to_string(),
            status_style(extension.status).apply_to(extension.status)
        ));
    }
    out
}

fn status_style(status: ExtensionStatus) -> Style {
    match status {
        ExtensionStatus::Active => Style::new().green(),
        ExtensionStatus::Pending => Style::new().yellow(),
        ExtensionStatus::Retired => Style::new().dim(),
    }
}
