//! Overlay ledger (overlay.lock)
//!
//! The ledger is the organization's record of its extensions: where each one
//! is mounted in the upstream schema, what it defines, and which upstream tag
//! it was last applied against. Extensions are never deleted; retiring one
//! keeps it in the ledger so its name is never reused.
//!
//! Every mutation bumps `revision`, which [`LedgerHandle`] uses to detect a
//! ledger that moved underneath a running reconciliation.

pub mod handle;


use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactVersion;
use crate::error::{OverlayError, Result, ledger};
use crate::schema::{FieldSpec, Schema, SchemaPath};

pub use handle::LedgerHandle;

/// How an extension attaches to the upstream tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    /// A new field grafted under the mount's parent
    Additive,
    /// Replaces type, constraints and default of the upstream field at the mount
    Override,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::Additive => f.write_str("additive"),
            ExtensionKind::Override => f.write_str("override"),
        }
    }
}

/// Lifecycle of an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    Active,
    /// Waiting for the next reconciliation (new, remounted or conflicting)
    Pending,
    Retired,
}

impl fmt::Display for ExtensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionStatus::Active => f.write_str("active"),
            ExtensionStatus::Pending => f.write_str("pending"),
            ExtensionStatus::Retired => f.write_str("retired"),
        }
    }
}

/// An organization-owned field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    pub mount: SchemaPath,
    pub kind: ExtensionKind,
    #[serde(flatten)]
    pub field: FieldSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_against: Option<String>,
    pub status: ExtensionStatus,
}

/// Why an extension cannot be placed in a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountProblem {
    /// The anchor does not exist
    AnchorMissing,
    /// The anchor of an additive extension exists but cannot hold fields
    ParentNotObject,
    /// An upstream field at the mount contradicts the definition
    Collision(String),
}

impl fmt::Display for MountProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountProblem::AnchorMissing => f.write_str("anchor does not exist"),
            MountProblem::ParentNotObject => f.write_str("parent is not an object"),
            MountProblem::Collision(reason) => write!(f, "collides with upstream field ({reason})"),
        }
    }
}

impl Extension {
    /// A new, never applied extension
    pub fn new(
        name: impl Into<String>,
        mount: SchemaPath,
        kind: ExtensionKind,
        field: FieldSpec,
    ) -> Self {
        Self {
            name: name.into(),
            mount,
            kind,
            field,
            applied_against: None,
            status: ExtensionStatus::Pending,
        }
    }

    /// Upstream location the extension depends on
    ///
    /// The mount's parent for additive extensions, the mount itself for
    /// overrides.
    pub fn anchor(&self) -> SchemaPath {
        match self.kind {
            ExtensionKind::Additive => self.mount.parent().unwrap_or_default(),
            ExtensionKind::Override => self.mount.clone(),
        }
    }

    /// Active or pending
    pub fn is_live(&self) -> bool {
        self.status != ExtensionStatus::Retired
    }

    /// Whether the extension can be placed at `mount` in `schema`
    pub fn placement_problem(&self, schema: &Schema, mount: &SchemaPath) -> Option<MountProblem> {
        match self.kind {
            ExtensionKind::Additive => {
                let parent = mount.parent().unwrap_or_default();
                if !parent.is_root() {
                    match schema.get(&parent) {
                        None => return Some(MountProblem::AnchorMissing),
                        Some(field) if !field.ty.is_object() => {
                            return Some(MountProblem::ParentNotObject);
                        }
                        Some(_) => {}
                    }
                }
                schema
                    .get(mount)
                    .and_then(|existing| self.field.conflict_with(&existing.spec()))
                    .map(MountProblem::Collision)
            }
            ExtensionKind::Override => match schema.get(mount) {
                None => Some(MountProblem::AnchorMissing),
                Some(existing) if existing.ty.is_object() && !self.field.ty.is_object() => Some(
                    MountProblem::Collision(format!(
                        "override of type {} would drop the children of an object",
                        self.field.ty
                    )),
                ),
                Some(_) => None,
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OverlayError::ConfigInvalid {
                message: "extension name must not be empty".to_string(),
            });
        }
        if self.mount.is_root() {
            return Err(OverlayError::InvalidPath {
                path: self.mount.to_string(),
                reason: format!("extension '{}' cannot be mounted at the root", self.name),
            });
        }
        Ok(())
    }
}

/// A ledger entry whose mount does not resolve where it claims to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub extension: String,
    pub mount: SchemaPath,
    pub tag: String,
    pub problem: MountProblem,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} does not resolve in {}: {}",
            self.extension, self.mount, self.tag, self.problem
        )
    }
}

/// Ordered record of extensions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayLedger {
    /// Upstream tag the ledger was last reconciled against
    #[serde(default)]
    pub base_tag: Option<String>,

    #[serde(default)]
    pub revision: u64,

    #[serde(default)]
    extensions: Vec<Extension>,
}

impl OverlayLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ledger from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| OverlayError::ConfigParseFailed {
            path: crate::workspace::LEDGER_FILE.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serialize ledger to JSON string (pretty-printed)
    pub fn to_json(&self) -> Result<String> {
        let mut json =
            serde_json::to_string_pretty(self).map_err(|e| OverlayError::ConfigParseFailed {
                path: crate::workspace::LEDGER_FILE.to_string(),
                reason: e.to_string(),
            })?;
        json.push('\n');
        Ok(json)
    }

    /// Register a new extension
    pub fn add_extension(&mut self, extension: Extension) -> Result<()> {
        extension.validate()?;

        if self.find(&extension.name).is_some() {
            return Err(ledger::duplicate_name(&extension.name));
        }
        self.check_mount(&extension.name, &extension.mount, &extension.field)?;

        self.extensions.push(extension);
        self.bump();
        Ok(())
    }

    /// Extensions in insertion order, retired ones included
    pub fn list_extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Active and pending extensions in insertion order
    pub fn live_extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter().filter(|e| e.is_live())
    }

    pub fn get(&self, name: &str) -> Result<&Extension> {
        self.find(name).ok_or_else(|| ledger::not_found(name))
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Record a successful application against `tag`
    pub fn mark_applied(&mut self, name: &str, tag: &str) -> Result<()> {
        let extension = self.live_mut(name)?;
        extension.status = ExtensionStatus::Active;
        extension.applied_against = Some(tag.to_string());
        self.bump();
        Ok(())
    }

    /// Record an application against `tag` at a (possibly rewritten) mount
    pub(crate) fn mark_applied_at(&mut self, name: &str, mount: SchemaPath, tag: &str) -> Result<()> {
        self.live_mut(name)?.mount = mount;
        self.mark_applied(name, tag)
    }

    /// Park an extension until the next reconciliation
    pub(crate) fn mark_pending(&mut self, name: &str) -> Result<()> {
        self.live_mut(name)?.status = ExtensionStatus::Pending;
        self.bump();
        Ok(())
    }

    /// Stop replaying an extension; it stays in the ledger
    pub fn mark_retired(&mut self, name: &str) -> Result<()> {
        self.live_mut(name)?.status = ExtensionStatus::Retired;
        self.bump();
        Ok(())
    }

    /// Move an extension to a new mount point
    ///
    /// The extension becomes pending and is evaluated directly against the
    /// next reconciliation target.
    pub fn remount(&mut self, name: &str, mount: SchemaPath) -> Result<()> {
        if mount.is_root() {
            return Err(OverlayError::InvalidPath {
                path: mount.to_string(),
                reason: format!("extension '{name}' cannot be mounted at the root"),
            });
        }
        let field = self.live_mut(name)?.field.clone();
        self.check_mount(name, &mount, &field)?;

        let extension = self.live_mut(name)?;
        extension.mount = mount;
        extension.status = ExtensionStatus::Pending;
        extension.applied_against = None;
        self.bump();
        Ok(())
    }

    /// Move `base_tag` forward after a reconciliation
    pub fn set_base_tag(&mut self, tag: &str) {
        self.base_tag = Some(tag.to_string());
        self.bump();
    }

    /// Extensions applied against `artifact` whose mount no longer resolves there
    pub fn check(&self, artifact: &ArtifactVersion) -> Vec<Inconsistency> {
        self.extensions
            .iter()
            .filter(|e| e.status == ExtensionStatus::Active)
            .filter(|e| e.applied_against.as_deref() == Some(artifact.tag()))
            .filter_map(|e| {
                e.placement_problem(artifact.schema(), &e.mount)
                    .map(|problem| Inconsistency {
                        extension: e.name.clone(),
                        mount: e.mount.clone(),
                        tag: artifact.tag().to_string(),
                        problem,
                    })
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name == name)
    }

    fn live_mut(&mut self, name: &str) -> Result<&mut Extension> {
        let extension = self
            .extensions
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| ledger::not_found(name))?;
        if !extension.is_live() {
            return Err(OverlayError::ExtensionRetired {
                name: name.to_string(),
            });
        }
        Ok(extension)
    }

    /// A live extension already at `mount` must agree with `field`
    fn check_mount(&self, name: &str, mount: &SchemaPath, field: &FieldSpec) -> Result<()> {
        for other in self.live_extensions() {
            if other.name == name || &other.mount != mount {
                continue;
            }
            if let Some(reason) = field.conflict_with(&other.field) {
                return Err(ledger::mount_conflict(name, &other.name, mount.to_string(), reason));
            }
        }
        Ok(())
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
