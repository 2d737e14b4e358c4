//! Command helper utilities

use std::path::PathBuf;
use std::sync::Arc;

use crate::artifact::{ArtifactStore, ArtifactVersion};
use crate::error::Result;
use crate::progress::Spinner;
use crate::workspace::Workspace;

/// Open the workspace named on the command line, or the nearest one above
/// the current directory
pub fn open_workspace(workspace: Option<PathBuf>) -> Result<Workspace> {
    Workspace::discover(workspace.as_deref())
}

/// Fetch one release behind a spinner
pub fn fetch(store: &ArtifactStore, tag: &str, show_progress: bool) -> Result<Arc<ArtifactVersion>> {
    let spinner = Spinner::start(format!("Fetching {tag}..."), show_progress);
    let version = store.fetch(tag)?;
    spinner.finish();
    Ok(version)
}

/// Fetch two releases behind a spinner
pub fn fetch_pair(
    store: &ArtifactStore,
    old: &str,
    new: &str,
    show_progress: bool,
) -> Result<(Arc<ArtifactVersion>, Arc<ArtifactVersion>)> {
    let spinner = Spinner::start(format!("Fetching {old} and {new}..."), show_progress);
    let pair = store.fetch_pair(old, new)?;
    spinner.finish();
    Ok(pair)
}
