//! Extension definitions declared in overlay.yaml

use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result, config};
use crate::ledger::{Extension, ExtensionKind};
use crate::schema::{FieldSpec, SchemaPath};

fn default_kind() -> ExtensionKind {
    ExtensionKind::Additive
}

/// A field the organization owns
///
/// ```yaml
/// - name: county_code
///   mount: metadata.custom.county_code
///   type: string
///   constraints: { max_length: 5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDef {
    pub name: String,

    pub mount: SchemaPath,

    #[serde(default = "default_kind")]
    pub kind: ExtensionKind,

    #[serde(flatten)]
    pub field: FieldSpec,
}

impl ExtensionDef {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(config::invalid("extension name must not be empty"));
        }
        if self.mount.is_root() {
            return Err(OverlayError::InvalidPath {
                path: String::new(),
                reason: format!("extension '{}' needs a mount point", self.name),
            });
        }
        Ok(())
    }

    /// A fresh, pending ledger entry for this definition
    pub fn to_extension(&self) -> Extension {
        Extension::new(
            self.name.clone(),
            self.mount.clone(),
            self.kind,
            self.field.clone(),
        )
    }
}
