//! Workspace errors

use super::OverlayError;

/// Creates a workspace not found error
pub fn not_found(path: impl Into<String>) -> OverlayError {
    OverlayError::WorkspaceNotFound { path: path.into() }
}

/// Creates a ledger missing error
pub fn ledger_missing(path: impl Into<String>) -> OverlayError {
    OverlayError::LedgerMissing { path: path.into() }
}

/// Creates a ledger already exists error
pub fn ledger_exists(path: impl Into<String>) -> OverlayError {
    OverlayError::LedgerExists { path: path.into() }
}

/// Creates a lock failure error
pub fn lock_failed(reason: impl Into<String>) -> OverlayError {
    OverlayError::LedgerLockFailed {
        reason: reason.into(),
    }
}
