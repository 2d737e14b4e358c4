//! Per-extension classification against a Delta

use tracing::debug;

use super::{Classification, ConflictKind, ReconcileOptions, Resolution};
use crate::diff::{Delta, DeltaEntry};
use crate::ledger::{Extension, ExtensionKind, MountProblem};
use crate::schema::{FieldSpec, Schema, SchemaPath};

/// Classification of one extension plus its evidence
#[derive(Debug, Clone)]
pub(crate) struct Verdict {
    pub classification: Classification,
    /// Mount after this run (rewritten for shifted extensions)
    pub mount: SchemaPath,
    pub entry: Option<usize>,
    /// Every Delta entry that bore on the extension, `entry` included
    pub touched: Vec<usize>,
    pub reason: Option<String>,
    pub conflict: Option<(ConflictKind, Resolution)>,
}

impl Verdict {
    pub fn clean(mount: SchemaPath, entry: Option<usize>, reason: Option<String>) -> Self {
        Self {
            classification: Classification::Clean,
            mount,
            entry,
            touched: Vec::new(),
            reason,
            conflict: None,
        }
    }

    fn shifted(mount: SchemaPath, entry: usize, reason: String) -> Self {
        Self {
            classification: Classification::Shifted,
            mount,
            entry: Some(entry),
            touched: Vec::new(),
            reason: Some(reason),
            conflict: None,
        }
    }

    fn orphaned(mount: SchemaPath, entry: usize) -> Self {
        Self {
            classification: Classification::OrphanedSafe,
            mount,
            entry: Some(entry),
            touched: Vec::new(),
            reason: Some("upstream field at the mount was removed; the extension now stands alone".to_string()),
            conflict: None,
        }
    }

    pub fn conflict(
        kind: ConflictKind,
        mount: SchemaPath,
        entry: Option<usize>,
        reason: String,
        resolution: Resolution,
    ) -> Self {
        Self {
            classification: Classification::Conflicting,
            mount,
            entry,
            touched: Vec::new(),
            reason: Some(reason),
            conflict: Some((kind, resolution)),
        }
    }

    /// Carry the entries of the verdict this one replaces
    pub fn touching(mut self, touched: Vec<usize>) -> Self {
        self.touched = touched;
        self
    }

    pub fn is_conflict(&self) -> bool {
        self.conflict.is_some()
    }

    fn rank(&self) -> u8 {
        match self.classification {
            Classification::Clean => 0,
            Classification::OrphanedSafe => 1,
            Classification::Shifted => 2,
            Classification::Conflicting => 3,
        }
    }
}

/// Classify one live extension
pub(crate) fn classify(
    ext: &Extension,
    delta: &Delta,
    schema: &Schema,
    options: &ReconcileOptions,
) -> Verdict {
    let verdict = if ext.applied_against.as_deref() == Some(delta.from_tag.as_str()) {
        from_delta(ext, delta, options)
    } else {
        debug!(
            extension = %ext.name,
            applied_against = ?ext.applied_against,
            "delta does not describe the extension's basis, checking new schema directly"
        );
        Verdict::clean(ext.mount.clone(), None, None)
    };

    if verdict.is_conflict() {
        return verdict;
    }

    // Whatever the delta says, the extension must fit the new tree
    match ext.placement_problem(schema, &verdict.mount) {
        None => verdict,
        Some(problem) => placement_conflict(ext, &verdict, problem),
    }
}

fn placement_conflict(ext: &Extension, verdict: &Verdict, problem: MountProblem) -> Verdict {
    let kind = match problem {
        MountProblem::AnchorMissing => ConflictKind::UnresolvedMount,
        MountProblem::ParentNotObject => ConflictKind::ParentNotObject,
        MountProblem::Collision(_) => ConflictKind::UpstreamCollision,
    };
    Verdict::conflict(
        kind,
        ext.mount.clone(),
        verdict.entry,
        format!("{} at {}", problem, verdict.mount),
        Resolution::Manual,
    )
    .touching(verdict.touched.clone())
}

fn from_delta(ext: &Extension, delta: &Delta, options: &ReconcileOptions) -> Verdict {
    let anchor = ext.anchor();
    let additive = ext.kind == ExtensionKind::Additive;
    let mut findings: Vec<Verdict> = Vec::new();
    let mut mount = ext.mount.clone();
    let mut touched = Vec::new();

    // Every move covering the anchor must be trusted; the deepest one decides
    // where it lives now
    let mut relocations: Vec<(usize, &SchemaPath, &SchemaPath, f64, bool)> = delta
        .indexed()
        .filter_map(|(index, entry)| match entry {
            DeltaEntry::Moved {
                from,
                to,
                confidence,
                ambiguous,
            } if anchor.starts_with(from) => Some((index, from, to, *confidence, *ambiguous)),
            _ => None,
        })
        .collect();
    relocations.sort_by_key(|(_, from, ..)| from.depth());
    touched.extend(relocations.iter().map(|(index, ..)| *index));

    if let Some(&(deepest, from, to, confidence, _)) = relocations.last() {
        let target = ext.mount.rebase(from, to).unwrap_or_else(|| to.clone());
        let doubtful = relocations
            .iter()
            .find(|(_, _, _, confidence, ambiguous)| *ambiguous || *confidence <= options.move_threshold);

        match doubtful {
            Some(&(index, from, _, _, true)) => findings.push(Verdict::conflict(
                ConflictKind::AmbiguousMove,
                ext.mount.clone(),
                Some(index),
                format!("{from} moved, but more than one upstream field matches equally well"),
                Resolution::Remount { path: target },
            )),
            Some(&(index, from, to, confidence, false)) => findings.push(Verdict::conflict(
                ConflictKind::LowConfidenceMove,
                ext.mount.clone(),
                Some(index),
                format!(
                    "{from} probably moved to {to}, but confidence {confidence:.2} is not above {:.2}",
                    options.move_threshold
                ),
                Resolution::Remount { path: target },
            )),
            None => {
                findings.push(Verdict::shifted(
                    target.clone(),
                    deepest,
                    format!("{from} moved to {to} (confidence {confidence:.2})"),
                ));
                mount = target;
            }
        }
    }

    let anchor_now = if additive {
        mount.parent().unwrap_or_default()
    } else {
        mount.clone()
    };

    for (index, entry) in delta.indexed() {
        let finding = match entry {
            DeltaEntry::Removed { path, .. } if anchor.starts_with(path) => Some(Verdict::conflict(
                ConflictKind::MountRemoved,
                ext.mount.clone(),
                Some(index),
                format!("{path} was removed upstream"),
                Resolution::Manual,
            )),
            DeltaEntry::Removed { path, .. } if additive && *path == ext.mount => {
                Some(Verdict::orphaned(mount.clone(), index))
            }
            DeltaEntry::Moved { from, .. } if additive && *from == ext.mount => {
                Some(Verdict::orphaned(mount.clone(), index))
            }
            DeltaEntry::Changed { path, old, new } if *path == anchor_now => {
                anchor_changed(ext, &mount, index, old, new)
            }
            DeltaEntry::Changed { path, new, .. } if additive && *path == mount => {
                Some(upstream_at_mount(ext, &mount, index, new))
            }
            DeltaEntry::Added { path, field } if additive && *path == mount => {
                Some(upstream_at_mount(ext, &mount, index, &field.spec()))
            }
            _ => None,
        };
        findings.extend(finding);
    }
    touched.extend(findings.iter().filter_map(|f| f.entry));
    touched.sort_unstable();
    touched.dedup();

    // Conflicting > Shifted > Orphaned > Clean; first finding wins a tie
    findings
        .into_iter()
        .fold(None::<Verdict>, |best, next| match best {
            Some(best) if best.rank() >= next.rank() => Some(best),
            _ => Some(next),
        })
        .unwrap_or_else(|| Verdict::clean(mount, None, None))
        .touching(touched)
}

fn anchor_changed(
    ext: &Extension,
    mount: &SchemaPath,
    index: usize,
    old: &FieldSpec,
    new: &FieldSpec,
) -> Option<Verdict> {
    match ext.kind {
        ExtensionKind::Additive if !new.ty.is_object() => Some(Verdict::conflict(
            ConflictKind::ParentNotObject,
            ext.mount.clone(),
            Some(index),
            format!("{} changed from {} to {}", mount.parent().unwrap_or_default(), old.ty, new.ty),
            Resolution::Manual,
        )),
        ExtensionKind::Additive => None,
        ExtensionKind::Override => {
            let narrowing = old.narrowing(new);
            if narrowing.is_empty() {
                Some(Verdict::clean(
                    mount.clone(),
                    Some(index),
                    Some("upstream change is a widening".to_string()),
                ))
            } else {
                Some(Verdict::conflict(
                    ConflictKind::IncompatibleChange,
                    ext.mount.clone(),
                    Some(index),
                    narrowing.join("; "),
                    Resolution::Manual,
                ))
            }
        }
    }
}

fn upstream_at_mount(ext: &Extension, mount: &SchemaPath, index: usize, upstream: &FieldSpec) -> Verdict {
    match ext.field.conflict_with(upstream) {
        Some(reason) => Verdict::conflict(
            ConflictKind::UpstreamCollision,
            ext.mount.clone(),
            Some(index),
            format!("upstream now defines {mount}: {reason}"),
            Resolution::Manual,
        ),
        None => Verdict::clean(
            mount.clone(),
            Some(index),
            Some("upstream now defines a compatible field at the mount".to_string()),
        ),
    }
}
