//! Overlay ledger errors

use super::OverlayError;

/// Creates a duplicate extension name error
pub fn duplicate_name(name: impl Into<String>) -> OverlayError {
    OverlayError::DuplicateName { name: name.into() }
}

/// Creates a mount conflict error
pub fn mount_conflict(
    name: impl Into<String>,
    existing: impl Into<String>,
    mount: impl Into<String>,
    reason: impl Into<String>,
) -> OverlayError {
    OverlayError::MountConflict {
        name: name.into(),
        existing: existing.into(),
        mount: mount.into(),
        reason: reason.into(),
    }
}

/// Creates an extension not found error
pub fn not_found(name: impl Into<String>) -> OverlayError {
    OverlayError::ExtensionNotFound { name: name.into() }
}

/// Creates a merge incomplete error from the conflicting extension names
pub fn merge_incomplete(tag: impl Into<String>, names: &[String]) -> OverlayError {
    OverlayError::MergeIncomplete {
        tag: tag.into(),
        count: names.len(),
        names: names.join(", "),
    }
}

/// Creates a ledger inconsistency error
pub fn inconsistent(tag: impl Into<String>, count: usize) -> OverlayError {
    OverlayError::LedgerInconsistent {
        tag: tag.into(),
        count,
    }
}
