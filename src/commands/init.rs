//! Init command implementation
//!
//! Seeds the ledger from the extension definitions in `overlay.yaml`. Every
//! definition must place cleanly into the starting release; the ledger then
//! records them as applied against it.

use std::path::PathBuf;

use console::Style;
use tracing::info;

use super::helpers;
use crate::artifact::ArtifactVersion;
use crate::cli::InitArgs;
use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result, workspace as workspace_error};
use crate::ledger::OverlayLedger;

/// Run init command
pub fn run(workspace: Option<PathBuf>, args: InitArgs) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    if workspace.has_ledger() {
        return Err(workspace_error::ledger_exists(
            workspace.ledger_path().display().to_string(),
        ));
    }

    let store = workspace.store()?;
    let artifact = helpers::fetch(&store, &args.tag, true)?;
    let ledger = seed_ledger(&workspace.config, &artifact)?;
    workspace.create_ledger(&ledger)?;
    info!(tag = %args.tag, extensions = ledger.len(), "workspace initialized");

    println!(
        "Initialized ledger at {} with {} extension(s) applied against {}",
        workspace.ledger_path().display(),
        ledger.len(),
        Style::new().bold().apply_to(artifact.tag())
    );
    Ok(())
}

/// Ledger with every configured extension applied against `artifact`
fn seed_ledger(config: &OverlayConfig, artifact: &ArtifactVersion) -> Result<OverlayLedger> {
    let mut ledger = OverlayLedger::new();

    for def in &config.extensions {
        let extension = def.to_extension();
        if let Some(problem) = extension.placement_problem(artifact.schema(), &extension.mount) {
            return Err(OverlayError::InvalidPath {
                path: extension.mount.to_string(),
                reason: format!(
                    "extension '{}' cannot be placed in {}: {problem}",
                    extension.name,
                    artifact.tag()
                ),
            });
        }
        ledger.add_extension(extension)?;
        ledger.mark_applied(&def.name, artifact.tag())?;
    }

    ledger.set_base_tag(artifact.tag());
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ExtensionStatus;
    use crate::test_fixtures::*;

    const UPSTREAM: &str = "upstream:\n  source: dir\n  location: upstream\n  schema_path: schema/metadata.yaml\n";

    fn config(extensions: &str) -> OverlayConfig {
        OverlayConfig::from_yaml(&format!("{UPSTREAM}extensions:\n{extensions}")).unwrap()
    }

    fn v1() -> ArtifactVersion {
        ArtifactVersion::from_schema("v1", base_schema())
    }

    #[test]
    fn test_seed_marks_extensions_applied() {
        let config = config(
            "  - name: county_code\n    mount: metadata.custom.county_code\n    type: string\n\
             \x20 - name: title_override\n    mount: metadata.title\n    kind: override\n    type: string\n",
        );
        let ledger = seed_ledger(&config, &v1()).unwrap();

        assert_eq!(ledger.base_tag.as_deref(), Some("v1"));
        assert_eq!(ledger.len(), 2);
        for extension in ledger.list_extensions() {
            assert_eq!(extension.status, ExtensionStatus::Active);
            assert_eq!(extension.applied_against.as_deref(), Some("v1"));
        }
        assert!(ledger.check(&v1()).is_empty());
    }

    #[test]
    fn test_seed_rejects_missing_anchor() {
        let config = config("  - name: lost\n    mount: metadata.nowhere.lost\n    type: string\n");
        let err = seed_ledger(&config, &v1()).unwrap_err();
        assert!(matches!(err, OverlayError::InvalidPath { .. }));
    }

    #[test]
    fn test_seed_rejects_upstream_collision() {
        let config = config("  - name: title\n    mount: metadata.title\n    type: integer\n");
        assert!(seed_ledger(&config, &v1()).is_err());
    }

    #[test]
    fn test_seed_without_extensions() {
        let config = OverlayConfig::from_yaml(UPSTREAM).unwrap();
        let ledger = seed_ledger(&config, &v1()).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.base_tag.as_deref(), Some("v1"));
    }
}
