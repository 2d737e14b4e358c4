//! Git operation errors

use super::OverlayError;

/// Creates a git operation failed error
pub fn operation_failed(message: impl Into<String>) -> OverlayError {
    OverlayError::GitOperationFailed {
        message: message.into(),
    }
}

/// Creates a clone failed error
pub fn clone_failed(url: impl Into<String>, reason: impl Into<String>) -> OverlayError {
    OverlayError::GitCloneFailed {
        url: url.into(),
        reason: reason.into(),
    }
}
