//! Show command implementation

use std::fmt::Write as _;
use std::path::PathBuf;

use console::Style;

use super::helpers;
use crate::cli::ShowArgs;
use crate::error::Result;
use crate::ledger::Extension;

/// Run show command
pub fn run(workspace: Option<PathBuf>, args: ShowArgs) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let ledger = workspace.load_ledger()?;
    let extension = ledger.get(&args.name)?;
    print!("{}", render(extension));
    if workspace.config.find_extension(&args.name).is_none() {
        println!(
            "  {}",
            Style::new()
                .dim()
                .apply_to("Not defined in overlay.yaml (the ledger entry is authoritative)")
        );
    }
    Ok(())
}

fn render(extension: &Extension) -> String {
    let label = Style::new().bold();
    let mut out = String::new();

    let _ = writeln!(out, "{}", Style::new().bold().yellow().apply_to(&extension.name));
    let _ = writeln!(out, "  {} {}", label.apply_to("Mount:"), extension.mount);
    let _ = writeln!(out, "  {} {}", label.apply_to("Kind:"), extension.kind);
    let _ = writeln!(out, "  {} {}", label.apply_to("Type:"), extension.field.ty);
    let _ = writeln!(out, "  {} {}", label.apply_to("Status:"), extension.status);
    let _ = writeln!(
        out,
        "  {} {}",
        label.apply_to("Applied against:"),
        extension.applied_against.as_deref().unwrap_or("never")
    );

    let constraints = &extension.field.constraints;
    if !constraints.is_empty() {
        let rendered = serde_json::to_string(constraints).unwrap_or_default();
        let _ = writeln!(out, "  {} {rendered}", label.apply_to("Constraints:"));
    }
    if let Some(default) = &extension.field.default {
        let _ = writeln!(out, "  {} {default}", label.apply_to("Default:"));
    }
    out
}
