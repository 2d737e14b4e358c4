//! Upstream artifact errors

use super::OverlayError;

/// Creates an artifact not found error
pub fn not_found(tag: impl Into<String>, source_name: impl Into<String>) -> OverlayError {
    OverlayError::ArtifactNotFound {
        tag: tag.into(),
        source_name: source_name.into(),
    }
}

/// Creates a fetch failed error
pub fn fetch_failed(tag: impl Into<String>, attempts: u32, reason: impl Into<String>) -> OverlayError {
    OverlayError::FetchFailed {
        tag: tag.into(),
        attempts,
        reason: reason.into(),
    }
}

/// Creates a malformed artifact error
pub fn malformed(tag: impl Into<String>, reason: impl Into<String>) -> OverlayError {
    OverlayError::MalformedArtifact {
        tag: tag.into(),
        reason: reason.into(),
    }
}
