//! Reconciler
//!
//! Re-applies every live extension against a new upstream snapshot. Each one
//! is classified as clean, shifted (its anchor moved and the mount was
//! rewritten), orphaned-but-safe, or conflicting. The run is a pure function:
//! it reads an immutable ledger snapshot and returns a new ledger value, the
//! merged schema and the conflict set. Nothing is committed here.

mod classify;
mod merge;

#[cfg(test)]
mod tests;

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::artifact::ArtifactVersion;
use crate::diff::Delta;
use crate::error::{Result, ledger as ledger_error};
use crate::ledger::{ExtensionKind, OverlayLedger};
use crate::schema::{Schema, SchemaPath};

use classify::Verdict;

/// Default confidence a move must exceed to be followed automatically
pub const DEFAULT_MOVE_THRESHOLD: f64 = 0.6;

/// Reconciler tuning
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub move_threshold: f64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            move_threshold: DEFAULT_MOVE_THRESHOLD,
        }
    }
}

/// What a reconciliation did with one extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Applies unchanged
    Clean,
    /// Anchor moved upstream; mount rewritten
    Shifted,
    /// Needs a human
    Conflicting,
    /// Upstream dropped the field at the mount; the extension stands alone
    OrphanedSafe,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Clean => f.write_str("clean"),
            Classification::Shifted => f.write_str("shifted"),
            Classification::Conflicting => f.write_str("conflicting"),
            Classification::OrphanedSafe => f.write_str("orphaned_safe"),
        }
    }
}

/// Why an extension could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    MountRemoved,
    AmbiguousMove,
    LowConfidenceMove,
    IncompatibleChange,
    ParentNotObject,
    UpstreamCollision,
    MountCollision,
    UnresolvedMount,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictKind::MountRemoved => "mount_removed",
            ConflictKind::AmbiguousMove => "ambiguous_move",
            ConflictKind::LowConfidenceMove => "low_confidence_move",
            ConflictKind::IncompatibleChange => "incompatible_change",
            ConflictKind::ParentNotObject => "parent_not_object",
            ConflictKind::UpstreamCollision => "upstream_collision",
            ConflictKind::MountCollision => "mount_collision",
            ConflictKind::UnresolvedMount => "unresolved_mount",
        };
        f.write_str(name)
    }
}

/// Suggested way out of a conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Resolution {
    /// `overlay remount <extension> <path>` should fix it
    Remount { path: SchemaPath },
    Manual,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Remount { path } => write!(f, "remount to {path}"),
            Resolution::Manual => f.write_str("manual"),
        }
    }
}

/// An extension that could not be applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord {
    pub extension: String,
    pub mount: SchemaPath,
    /// Index into the run's Delta, when one entry is responsible
    pub delta_entry: Option<usize>,
    pub kind: ConflictKind,
    pub reason: String,
    pub resolution: Resolution,
}

/// Per-extension result of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub extension: String,
    pub kind: ExtensionKind,
    pub classification: Classification,
    pub previous_mount: SchemaPath,
    pub mount: SchemaPath,
    pub delta_entry: Option<usize>,
    /// Every Delta entry that bore on the extension
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub touched: Vec<usize>,
    pub reason: Option<String>,
}

/// How the command surface treats conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Conflicting extensions stay pending; the rest is applied
    #[default]
    Partial,
    /// Any conflict fails the run with `MergeIncomplete`
    Total,
}

/// Result of one reconciliation run
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub from_tag: String,
    pub to_tag: String,
    /// Revision of the ledger snapshot the run started from
    pub basis_revision: u64,
    /// One per live extension, in ledger order
    pub outcomes: Vec<Outcome>,
    pub conflicts: Vec<ConflictRecord>,
    /// Updated ledger, not yet committed
    pub ledger: OverlayLedger,
    /// New upstream tree with every applied extension grafted in
    pub merged: Schema,
}

impl Reconciliation {
    /// No extension was left conflicting
    pub fn is_total(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Fail with `MergeIncomplete` unless every extension applied
    pub fn require_total(&self) -> Result<()> {
        if self.is_total() {
            return Ok(());
        }
        let names: Vec<String> = self.conflicts.iter().map(|c| c.extension.clone()).collect();
        Err(ledger_error::merge_incomplete(&self.to_tag, &names))
    }

    /// Apply the merge mode policy
    pub fn accept(self, mode: MergeMode) -> Result<Self> {
        if mode == MergeMode::Total {
            self.require_total()?;
        }
        Ok(self)
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.classification == classification)
            .count()
    }
}

/// Reconcile every live extension of `ledger` against `new_artifact`
///
/// `delta` must describe the change from the ledger's base to `new_artifact`.
pub fn reconcile(
    ledger: &OverlayLedger,
    delta: &Delta,
    new_artifact: &ArtifactVersion,
    options: &ReconcileOptions,
) -> Result<Reconciliation> {
    let schema = new_artifact.schema();
    let extensions: Vec<_> = ledger.live_extensions().collect();

    let mut verdicts: Vec<Verdict> = extensions
        .iter()
        .map(|ext| classify::classify(ext, delta, schema, options))
        .collect();

    // Two applied extensions landing on one mount must agree; the later yields
    for later in 0..verdicts.len() {
        if verdicts[later].is_conflict() {
            continue;
        }
        let clash = (0..later)
            .filter(|&earlier| !verdicts[earlier].is_conflict())
            .filter(|&earlier| verdicts[earlier].mount == verdicts[later].mount)
            .find_map(|earlier| {
                extensions[later]
                    .field
                    .conflict_with(&extensions[earlier].field)
                    .map(|reason| (earlier, reason))
            });
        if let Some((earlier, reason)) = clash {
            let touched = std::mem::take(&mut verdicts[later].touched);
            verdicts[later] = Verdict::conflict(
                ConflictKind::MountCollision,
                extensions[later].mount.clone(),
                verdicts[later].entry,
                format!(
                    "{} also lands on {} ({reason})",
                    extensions[earlier].name, verdicts[later].mount
                ),
                Resolution::Manual,
            )
            .touching(touched);
        }
    }

    let mut merged = schema.clone();
    for (ext, verdict) in extensions.iter().zip(verdicts.iter_mut()) {
        if verdict.is_conflict() {
            continue;
        }
        if let Err(reason) = merge::graft(&mut merged, ext, &verdict.mount) {
            let touched = std::mem::take(&mut verdict.touched);
            *verdict = Verdict::conflict(
                ConflictKind::UnresolvedMount,
                ext.mount.clone(),
                verdict.entry,
                reason,
                Resolution::Manual,
            )
            .touching(touched);
        }
    }

    let mut updated = ledger.clone();
    let mut outcomes = Vec::with_capacity(extensions.len());
    let mut conflicts = Vec::new();

    for (ext, verdict) in extensions.iter().zip(verdicts) {
        debug!(
            extension = %ext.name,
            classification = %verdict.classification,
            mount = %verdict.mount,
            "extension classified"
        );

        match &verdict.conflict {
            Some((kind, resolution)) => {
                updated.mark_pending(&ext.name)?;
                conflicts.push(ConflictRecord {
                    extension: ext.name.clone(),
                    mount: ext.mount.clone(),
                    delta_entry: verdict.entry,
                    kind: *kind,
                    reason: verdict.reason.clone().unwrap_or_default(),
                    resolution: resolution.clone(),
                });
            }
            None => {
                updated.mark_applied_at(&ext.name, verdict.mount.clone(), new_artifact.tag())?;
            }
        }

        outcomes.push(Outcome {
            extension: ext.name.clone(),
            kind: ext.kind,
            classification: verdict.classification,
            previous_mount: ext.mount.clone(),
            mount: verdict.mount,
            delta_entry: verdict.entry,
            touched: verdict.touched,
            reason: verdict.reason,
        });
    }
    updated.set_base_tag(new_artifact.tag());

    let reconciliation = Reconciliation {
        from_tag: delta.from_tag.clone(),
        to_tag: new_artifact.tag().to_string(),
        basis_revision: ledger.revision,
        outcomes,
        conflicts,
        ledger: updated,
        merged,
    };

    info!(
        from = %reconciliation.from_tag,
        to = %reconciliation.to_tag,
        clean = reconciliation.count(Classification::Clean),
        shifted = reconciliation.count(Classification::Shifted),
        orphaned = reconciliation.count(Classification::OrphanedSafe),
        conflicting = reconciliation.count(Classification::Conflicting),
        "reconciliation finished"
    );

    Ok(reconciliation)
}
