//! Cache errors

use super::OverlayError;

/// Creates a cache operation failed error
pub fn operation_failed(message: impl Into<String>) -> OverlayError {
    OverlayError::CacheOperationFailed {
        message: message.into(),
    }
}
