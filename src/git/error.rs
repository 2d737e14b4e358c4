//! Git error interpretation
//!
//! Maps git2 errors onto short user-facing messages and decides whether the
//! failure is worth retrying.

use git2::{Error, ErrorClass};

/// What went wrong talking to the upstream repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitFailure {
    RepositoryNotFound,
    AuthenticationFailed,
    PermissionDenied,
    Network,
    Certificate,
    Other,
}

impl GitFailure {
    /// Failures that may go away on their own
    pub fn is_transient(self) -> bool {
        matches!(self, GitFailure::Network)
    }
}

type ErrorCheck = fn(&str, ErrorClass) -> bool;

const CLASSIFICATIONS: &[(ErrorCheck, GitFailure)] = &[
    (
        |msg, _| {
            msg.contains("not found")
                || msg.contains("404")
                || msg.contains("too many redirects")
                || msg.contains("authentication replays")
        },
        GitFailure::RepositoryNotFound,
    ),
    (
        |msg, _| msg.contains("authentication") || msg.contains("credentials"),
        GitFailure::AuthenticationFailed,
    ),
    (
        |msg, _| msg.contains("permission denied") || msg.contains("access denied"),
        GitFailure::PermissionDenied,
    ),
    (
        |msg, class| {
            msg.contains("connection")
                || msg.contains("network")
                || msg.contains("timeout")
                || msg.contains("timed out")
                || msg.contains("could not resolve host")
                || class == ErrorClass::Net
        },
        GitFailure::Network,
    ),
    (
        |msg, class| class == ErrorClass::Http && (msg.contains("certificate") || msg.contains("ssl")),
        GitFailure::Certificate,
    ),
];

/// Classify a git2 error
pub fn classify(err: &Error) -> GitFailure {
    let message = err.message().to_lowercase();
    CLASSIFICATIONS
        .iter()
        .find(|(check, _)| check(&message, err.class()))
        .map_or(GitFailure::Other, |(_, failure)| *failure)
}

/// Interpret a git2 error and provide a more user-friendly message
pub fn interpret_git_error(err: &Error) -> String {
    match classify(err) {
        GitFailure::RepositoryNotFound => "Repository not found".to_string(),
        GitFailure::AuthenticationFailed => "Authentication failed".to_string(),
        GitFailure::PermissionDenied => "Permission denied".to_string(),
        GitFailure::Network => format!("Network error: {}", err.message()),
        GitFailure::Certificate => "Certificate error".to_string(),
        GitFailure::Other => match err.class() {
            ErrorClass::Http => format!("HTTP error: {}", err.message()),
            ErrorClass::Ssh => format!("SSH error: {}", err.message()),
            _ => err.message().to_string(),
        },
    }
}
