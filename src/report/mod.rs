//! Audit report of a reconciliation
//!
//! One entry per reconciled extension, followed by one entry per Delta entry
//! that touched no extension. The JSON rendering is the compatibility surface
//! consumed by other tooling; field names and enum values are stable.

pub mod narrative;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::diff::{Delta, DeltaEntry};
use crate::error::{OverlayError, Result};
use crate::ledger::{ExtensionKind, ExtensionStatus, OverlayLedger};
use crate::reconcile::{Classification, ConflictKind, Reconciliation, Resolution};
use crate::schema::SchemaPath;

/// Version of the JSON layout
pub const REPORT_VERSION: u32 = 1;

/// Classification column of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryClass {
    Clean,
    Shifted,
    Conflicting,
    OrphanedSafe,
    /// Upstream change no extension depends on
    UpstreamOnly,
}

impl From<Classification> for EntryClass {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Clean => EntryClass::Clean,
            Classification::Shifted => EntryClass::Shifted,
            Classification::Conflicting => EntryClass::Conflicting,
            Classification::OrphanedSafe => EntryClass::OrphanedSafe,
        }
    }
}

/// Delta entry together with its position in the run's Delta
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRef {
    pub index: usize,
    #[serde(flatten)]
    pub entry: DeltaEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub classification: EntryClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ExtensionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExtensionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_mount: Option<SchemaPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount: Option<SchemaPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_entry: Option<DeltaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub clean: usize,
    pub shifted: usize,
    pub orphaned_safe: usize,
    pub conflicting: usize,
    pub upstream_only: usize,
}

impl Summary {
    fn count(&mut self, class: EntryClass) {
        match class {
            EntryClass::Clean => self.clean += 1,
            EntryClass::Shifted => self.shifted += 1,
            EntryClass::Conflicting => self.conflicting += 1,
            EntryClass::OrphanedSafe => self.orphaned_safe += 1,
            EntryClass::UpstreamOnly => self.upstream_only += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub report_version: u32,
    pub from_tag: String,
    pub to_tag: String,
    /// Revision the report's ledger is at
    pub ledger_revision: u64,
    pub summary: Summary,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self).map_err(|e| OverlayError::IoError {
            message: format!("Failed to serialize report: {e}"),
        })?;
        json.push('\n');
        Ok(json)
    }

    pub fn is_total(&self) -> bool {
        self.summary.conflicting == 0
    }
}

/// Build the report of a reconciliation
///
/// `ledger` is the ledger the reconciliation produced; statuses are read
/// from it.
pub fn render(ledger: &OverlayLedger, reconciliation: &Reconciliation, delta: &Delta) -> Report {
    let mut entries = Vec::with_capacity(reconciliation.outcomes.len());
    let mut referenced = BTreeSet::new();
    let mut summary = Summary::default();

    for outcome in &reconciliation.outcomes {
        let conflict = reconciliation
            .conflicts
            .iter()
            .find(|c| c.extension == outcome.extension);

        referenced.extend(outcome.delta_entry);
        referenced.extend(outcome.touched.iter().copied());

        let class = EntryClass::from(outcome.classification);
        summary.count(class);
        entries.push(ReportEntry {
            classification: class,
            extension: Some(outcome.extension.clone()),
            kind: Some(outcome.kind),
            status: ledger.get(&outcome.extension).ok().map(|e| e.status),
            previous_mount: Some(outcome.previous_mount.clone()),
            mount: Some(outcome.mount.clone()),
            delta_entry: delta_ref(delta, outcome.delta_entry),
            conflict: conflict.map(|c| c.kind),
            reason: outcome.reason.clone(),
            resolution: conflict.map(|c| c.resolution.clone()),
        });
    }

    for (index, entry) in delta.indexed() {
        if referenced.contains(&index) {
            continue;
        }
        summary.count(EntryClass::UpstreamOnly);
        entries.push(ReportEntry {
            classification: EntryClass::UpstreamOnly,
            extension: None,
            kind: None,
            status: None,
            previous_mount: None,
            mount: None,
            delta_entry: Some(DeltaRef {
                index,
                entry: entry.clone(),
            }),
            conflict: None,
            reason: None,
            resolution: None,
        });
    }

    Report {
        report_version: REPORT_VERSION,
        from_tag: reconciliation.from_tag.clone(),
        to_tag: reconciliation.to_tag.clone(),
        ledger_revision: ledger.revision,
        summary,
        entries,
    }
}

fn delta_ref(delta: &Delta, index: Option<usize>) -> Option<DeltaRef> {
    let index = index?;
    delta.get(index).map(|entry| DeltaRef {
        index,
        entry: entry.clone(),
    })
}
