//! Error types and handling for overlay
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`artifact`]: Upstream artifact retrieval and parsing errors
//! - [`ledger`]: Overlay ledger errors
//! - [`config`]: Configuration errors
//! - [`git`]: Git operation errors
//! - [`fs`]: File system errors
//! - [`cache`]: Cache errors
//! - [`workspace`]: Workspace and ledger file errors

pub mod artifact;
pub mod cache;
pub mod config;
pub mod fs;
pub mod git;
pub mod ledger;
pub mod workspace;

#[cfg(test)]
mod tests;

use miette::Diagnostic;
use thiserror::Error;

/// Exit code for a merge that left ConflictRecords behind
pub const EXIT_CONFLICTS: i32 = 2;

/// Exit code for upstream fetch or parse failures
pub const EXIT_UPSTREAM: i32 = 3;

/// Exit code for every other failure
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for overlay operations
#[derive(Error, Diagnostic, Debug)]
pub enum OverlayError {
    // Artifact errors
    #[error("Upstream tag '{tag}' not found in {source_name}")]
    #[diagnostic(
        code(overlay::artifact::not_found),
        help("Run 'overlay tags' to list the tags available upstream")
    )]
    ArtifactNotFound { tag: String, source_name: String },

    #[error("Failed to fetch upstream tag '{tag}' after {attempts} attempt(s): {reason}")]
    #[diagnostic(
        code(overlay::artifact::fetch_failed),
        help("The upstream source may be temporarily unavailable; retry later")
    )]
    FetchFailed {
        tag: String,
        attempts: u32,
        reason: String,
    },

    #[error("Upstream artifact '{tag}' is malformed: {reason}")]
    #[diagnostic(
        code(overlay::artifact::malformed),
        help("The upstream schema format changed in a way overlay does not understand")
    )]
    MalformedArtifact { tag: String, reason: String },

    // Schema errors
    #[error("Invalid schema path '{path}': {reason}")]
    #[diagnostic(
        code(overlay::schema::invalid_path),
        help("Paths are dot-separated field names, e.g. metadata.custom.county_code")
    )]
    InvalidPath { path: String, reason: String },

    // Ledger errors
    #[error("Extension '{name}' already exists in the ledger")]
    #[diagnostic(
        code(overlay::ledger::duplicate_name),
        help("Extension names are never reused, even after retirement")
    )]
    DuplicateName { name: String },

    #[error("Extension '{name}' collides with '{existing}' at mount point '{mount}': {reason}")]
    #[diagnostic(
        code(overlay::ledger::mount_conflict),
        help("Two extensions may share a mount point only with the same type and compatible constraints")
    )]
    MountConflict {
        name: String,
        existing: String,
        mount: String,
        reason: String,
    },

    #[error("Extension '{name}' not found in the ledger")]
    #[diagnostic(
        code(overlay::ledger::extension_not_found),
        help("Run 'overlay list --all' to see every extension")
    )]
    ExtensionNotFound { name: String },

    #[error("Extension '{name}' is retired")]
    #[diagnostic(code(overlay::ledger::retired))]
    ExtensionRetired { name: String },

    #[error("Ledger changed during the run (expected revision {expected}, found {found})")]
    #[diagnostic(
        code(overlay::ledger::stale),
        help("Re-run the reconciliation against the current ledger")
    )]
    StaleLedger { expected: u64, found: u64 },

    #[error("Ledger not found: {path}")]
    #[diagnostic(
        code(overlay::ledger::missing),
        help("Run 'overlay init <tag>' to create the ledger")
    )]
    LedgerMissing { path: String },

    #[error("Ledger already exists: {path}")]
    #[diagnostic(code(overlay::ledger::exists))]
    LedgerExists { path: String },

    #[error("Failed to lock the ledger: {reason}")]
    #[diagnostic(
        code(overlay::ledger::lock_failed),
        help("Another overlay process may be committing; wait for it to finish")
    )]
    LedgerLockFailed { reason: String },

    // Merge errors
    #[error("Merge against '{tag}' is incomplete: {count} extension(s) conflicting ({names})")]
    #[diagnostic(
        code(overlay::merge::incomplete),
        help("Resolve each conflict with 'overlay remount' or 'overlay retire', then reconcile again")
    )]
    MergeIncomplete {
        tag: String,
        count: usize,
        names: String,
    },

    #[error("Ledger is inconsistent with '{tag}': {count} extension(s) do not resolve")]
    #[diagnostic(
        code(overlay::ledger::inconsistent),
        help("Remount or retire the listed extensions")
    )]
    LedgerInconsistent { tag: String, count: usize },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(overlay::config::not_found),
        help("Create overlay.yaml in the workspace root")
    )]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration file: {path}: {reason}")]
    #[diagnostic(code(overlay::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(overlay::config::invalid))]
    ConfigInvalid { message: String },

    // Workspace errors
    #[error("Workspace not found at: {path}")]
    #[diagnostic(
        code(overlay::workspace::not_found),
        help("Run overlay from a directory containing overlay.yaml")
    )]
    WorkspaceNotFound { path: String },

    // Git errors
    #[error("Git operation failed: {message}")]
    #[diagnostic(code(overlay::git::operation_failed))]
    GitOperationFailed { message: String },

    #[error("Failed to clone repository: {url}: {reason}")]
    #[diagnostic(
        code(overlay::git::clone_failed),
        help("Check that the upstream URL is correct and you have access to the repository")
    )]
    GitCloneFailed { url: String, reason: String },

    // File system errors
    #[error("Failed to read file: {path}: {reason}")]
    #[diagnostic(code(overlay::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(overlay::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(overlay::fs::io_error))]
    IoError { message: String },

    // Cache errors
    #[error("Cache operation failed: {message}")]
    #[diagnostic(code(overlay::cache::operation_failed))]
    CacheOperationFailed { message: String },
}

impl OverlayError {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, OverlayError::FetchFailed { .. })
    }

    /// Process exit code for the command surface
    pub fn exit_code(&self) -> i32 {
        match self {
            OverlayError::MergeIncomplete { .. } => EXIT_CONFLICTS,
            OverlayError::ArtifactNotFound { .. }
            | OverlayError::FetchFailed { .. }
            | OverlayError::MalformedArtifact { .. }
            | OverlayError::GitCloneFailed { .. }
            | OverlayError::GitOperationFailed { .. } => EXIT_UPSTREAM,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(err: std::io::Error) -> Self {
        OverlayError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for OverlayError {
    fn from(err: serde_yaml::Error) -> Self {
        OverlayError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        OverlayError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<git2::Error> for OverlayError {
    fn from(err: git2::Error) -> Self {
        OverlayError::GitOperationFailed {
            message: err.to_string(),
        }
    }
}

impl From<inquire::InquireError> for OverlayError {
    fn from(err: inquire::InquireError) -> Self {
        OverlayError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, OverlayError>;
