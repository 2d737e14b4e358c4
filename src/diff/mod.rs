//! Schema differ
//!
//! Compares the extension surface of two upstream snapshots and produces a
//! [`Delta`]: fields added, removed, changed in place, and moved. Output is a
//! pure function of the two trees and the options, sorted canonically, so the
//! same inputs always serialize to the same bytes.

pub mod moves;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::artifact::ArtifactVersion;
use crate::schema::{Field, FieldSpec, Schema, SchemaPath};

use moves::Candidate;

/// Default minimum score for a move candidate
pub const DEFAULT_MOVE_FLOOR: f64 = 0.25;

/// Differ tuning
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Pairs scoring below this are never reported as moves
    pub move_floor: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            move_floor: DEFAULT_MOVE_FLOOR,
        }
    }
}

/// One structural difference between two schema trees
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaEntry {
    /// Subtree root present only in the new tree
    Added { path: SchemaPath, field: Field },
    /// Subtree root present only in the old tree
    Removed { path: SchemaPath, field: Field },
    /// Same field, different type or constraints
    Changed {
        path: SchemaPath,
        old: FieldSpec,
        new: FieldSpec,
    },
    /// A removal paired with an addition
    Moved {
        from: SchemaPath,
        to: SchemaPath,
        confidence: f64,
        ambiguous: bool,
    },
}

impl DeltaEntry {
    /// Path the entry is sorted and reported under
    pub fn path(&self) -> &SchemaPath {
        match self {
            DeltaEntry::Added { path, .. }
            | DeltaEntry::Removed { path, .. }
            | DeltaEntry::Changed { path, .. } => path,
            DeltaEntry::Moved { to, .. } => to,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            DeltaEntry::Removed { .. } => 0,
            DeltaEntry::Moved { .. } => 1,
            DeltaEntry::Added { .. } => 2,
            DeltaEntry::Changed { .. } => 3,
        }
    }
}

impl fmt::Display for DeltaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaEntry::Added { path, field } => write!(f, "added {path} ({})", field.ty),
            DeltaEntry::Removed { path, field } => write!(f, "removed {path} ({})", field.ty),
            DeltaEntry::Changed { path, old, new } => {
                write!(f, "changed {path} ({} -> {})", old.ty, new.ty)?;
                if old.constraints != new.constraints {
                    write!(f, " constraints differ")?;
                }
                Ok(())
            }
            DeltaEntry::Moved {
                from,
                to,
                confidence,
                ambiguous,
            } => {
                write!(f, "moved {from} -> {to} (confidence {confidence:.2})")?;
                if *ambiguous {
                    write!(f, " ambiguous")?;
                }
                Ok(())
            }
        }
    }
}

/// Differences from one upstream tag to another
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    pub from_tag: String,
    pub to_tag: String,
    pub entries: Vec<DeltaEntry>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&DeltaEntry> {
        self.entries.get(index)
    }

    /// Entries with their indices
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &DeltaEntry)> {
        self.entries.iter().enumerate()
    }
}

/// Diff two snapshots
pub fn diff(old: &ArtifactVersion, new: &ArtifactVersion, options: &DiffOptions) -> Delta {
    let delta = Delta {
        from_tag: old.tag().to_string(),
        to_tag: new.tag().to_string(),
        entries: diff_schemas(old.schema(), new.schema(), options),
    };
    debug!(
        from = %delta.from_tag,
        to = %delta.to_tag,
        entries = delta.len(),
        "schema diff computed"
    );
    delta
}

/// Diff two trees, returning canonically sorted entries
pub fn diff_schemas(old: &Schema, new: &Schema, options: &DiffOptions) -> Vec<DeltaEntry> {
    let mut entries = Vec::new();
    let mut removed = Vec::new();
    let mut added = Vec::new();

    let root = SchemaPath::root();
    compare_children(
        &old.fields,
        &new.fields,
        &root,
        &root,
        &mut entries,
        &mut removed,
        &mut added,
    );

    // Matched subtrees can surface further removals and additions; keep
    // pairing until nothing new matches.
    loop {
        let (matches, left_removed, left_added) =
            moves::infer(removed, added, options.move_floor);
        removed = left_removed;
        added = left_added;
        if matches.is_empty() {
            break;
        }

        for m in matches {
            if !m.from.field.same_shape(&m.to.field) {
                entries.push(DeltaEntry::Changed {
                    path: m.to.path.clone(),
                    old: m.from.field.spec(),
                    new: m.to.field.spec(),
                });
            }
            compare_children(
                &m.from.field.fields,
                &m.to.field.fields,
                &m.from.path,
                &m.to.path,
                &mut entries,
                &mut removed,
                &mut added,
            );
            entries.push(DeltaEntry::Moved {
                from: m.from.path,
                to: m.to.path,
                confidence: m.confidence,
                ambiguous: m.ambiguous,
            });
        }
    }

    entries.extend(
        removed
            .into_iter()
            .map(|c| DeltaEntry::Removed {
                path: c.path,
                field: c.field,
            }),
    );
    entries.extend(added.into_iter().map(|c| DeltaEntry::Added {
        path: c.path,
        field: c.field,
    }));

    entries.sort_by(|a, b| {
        a.path()
            .cmp(b.path())
            .then_with(|| a.rank().cmp(&b.rank()))
    });
    entries
}

/// Walk two sibling lists matched by name
///
/// `old_prefix` and `new_prefix` differ only inside a moved subtree; entries
/// are reported at new paths, removals at old paths.
fn compare_children(
    old: &[Field],
    new: &[Field],
    old_prefix: &SchemaPath,
    new_prefix: &SchemaPath,
    entries: &mut Vec<DeltaEntry>,
    removed: &mut Vec<Candidate>,
    added: &mut Vec<Candidate>,
) {
    let new_by_name: HashMap<&str, &Field> = new.iter().map(|f| (f.name.as_str(), f)).collect();

    for old_field in old {
        let old_path = old_prefix.child(&old_field.name);
        match new_by_name.get(old_field.name.as_str()) {
            Some(new_field) => {
                let new_path = new_prefix.child(&new_field.name);
                if !old_field.same_shape(new_field) {
                    entries.push(DeltaEntry::Changed {
                        path: new_path.clone(),
                        old: old_field.spec(),
                        new: new_field.spec(),
                    });
                }
                compare_children(
                    &old_field.fields,
                    &new_field.fields,
                    &old_path,
                    &new_path,
                    entries,
                    removed,
                    added,
                );
            }
            None => removed.push(Candidate {
                path: old_path,
                field: old_field.clone(),
            }),
        }
    }

    for new_field in new {
        if !old.iter().any(|f| f.name == new_field.name) {
            added.push(Candidate {
                path: new_prefix.child(&new_field.name),
                field: new_field.clone(),
            });
        }
    }
}
