//! Tags command implementation

use std::path::PathBuf;

use console::Style;

use super::helpers;
use crate::error::Result;

/// Run tags command
pub fn run(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let base_tag = if workspace.has_ledger() {
        workspace.load_ledger()?.base_tag
    } else {
        None
    };

    let tags = workspace.store()?.list_tags()?;
    if tags.is_empty() {
        println!("No upstream tags.");
        return Ok(());
    }

    for tag in &tags {
        if base_tag.as_deref() == Some(tag.as_str()) {
            println!(
                "{} {}",
                Style::new().bold().green().apply_to(tag),
                Style::new().dim().apply_to("(base)")
            );
        } else {
            println!("{tag}");
        }
    }
    Ok(())
}
