//! Error type tests
//!
//! Tests for OverlayError enum, its conversions and exit codes.

#![allow(clippy::expect_used)]

use crate::error::artifact::{fetch_failed, malformed, not_found as artifact_not_found};
use crate::error::cache::operation_failed as cache_operation_failed;
use crate::error::config::{invalid as config_invalid, not_found as config_not_found};
use crate::error::fs::{read_failed as file_read_failed, write_failed as file_write_failed};
use crate::error::git::{clone_failed, operation_failed as git_operation_failed};
use crate::error::ledger::{duplicate_name, merge_incomplete, mount_conflict};
use crate::error::{EXIT_CONFLICTS, EXIT_FAILURE, EXIT_UPSTREAM, OverlayError};
use miette::Diagnostic;

macro_rules! test_error_contains {
    ($test_name:ident, $err:expr, $($contains:expr),+ $(,)?) => {
        #[test]
        fn $test_name() {
            let err = $err;
            let error_string = err.to_string();
            $(
                assert!(error_string.contains($contains),
                    "Error message should contain '{}', got: {}",
                    $contains,
                    error_string
                );
            )+
        }
    };
}

#[test]
fn test_error_display() {
    let err = artifact_not_found("v9.9.9", "dir:/tmp/upstream");
    assert_eq!(
        err.to_string(),
        "Upstream tag 'v9.9.9' not found in dir:/tmp/upstream"
    );
}

#[test]
fn test_error_code() {
    let err = duplicate_name("county_code");
    assert_eq!(
        err.code()
            .map(|c: Box<dyn std::fmt::Display>| c.to_string()),
        Some("overlay::ledger::duplicate_name".to_string())
    );
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: OverlayError = io_err.into();
    assert!(matches!(err, OverlayError::IoError { .. }));
}

#[test]
fn test_yaml_error_conversion() {
    let parse_result: std::result::Result<serde_yaml::Value, _> =
        serde_yaml::from_str("invalid: yaml: content: [unclosed");
    let yaml_err = parse_result.expect_err("YAML parsing should have failed");
    let err: OverlayError = yaml_err.into();
    assert!(matches!(err, OverlayError::ConfigParseFailed { .. }));
}

#[test]
fn test_git_error_conversion() {
    let err: OverlayError = git2::Error::from_str("git error").into();
    assert!(matches!(err, OverlayError::GitOperationFailed { .. }));
}

test_error_contains!(
    test_fetch_failed_message,
    fetch_failed("v12.0.0", 3, "connection reset"),
    "v12.0.0",
    "3 attempt(s)",
    "connection reset"
);

test_error_contains!(
    test_malformed_message,
    malformed("v12.0.0", "expected a mapping"),
    "malformed",
    "expected a mapping"
);

test_error_contains!(
    test_mount_conflict_message,
    mount_conflict("notes_a", "notes_b", "metadata.custom.notes", "type string vs integer"),
    "notes_a",
    "notes_b",
    "metadata.custom.notes"
);

test_error_contains!(
    test_merge_incomplete_message,
    merge_incomplete("v2", &["site_id".to_string(), "lab".to_string()]),
    "2 extension(s)",
    "site_id, lab"
);

test_error_contains!(
    test_config_errors,
    config_not_found("/ws/overlay.yaml"),
    "Configuration file not found"
);

test_error_contains!(
    test_config_invalid,
    config_invalid("upstream.location is empty"),
    "Invalid configuration"
);

test_error_contains!(
    test_file_errors,
    file_read_failed("/ws/a", "permission denied"),
    "Failed to read file"
);

test_error_contains!(
    test_file_write_errors,
    file_write_failed("/ws/a", "disk full"),
    "Failed to write file"
);

test_error_contains!(
    test_git_errors,
    clone_failed("https://example.com/x.git", "Network error"),
    "Failed to clone repository"
);

test_error_contains!(
    test_git_operation_errors,
    git_operation_failed("fetch refused"),
    "Git operation failed"
);

test_error_contains!(
    test_cache_errors,
    cache_operation_failed("cache directory missing"),
    "Cache operation failed"
);

#[test]
fn test_exit_codes() {
    assert_eq!(merge_incomplete("v2", &[]).exit_code(), EXIT_CONFLICTS);
    assert_eq!(artifact_not_found("v2", "x").exit_code(), EXIT_UPSTREAM);
    assert_eq!(fetch_failed("v2", 1, "x").exit_code(), EXIT_UPSTREAM);
    assert_eq!(malformed("v2", "x").exit_code(), EXIT_UPSTREAM);
    assert_eq!(duplicate_name("x").exit_code(), EXIT_FAILURE);
}

#[test]
fn test_only_fetch_failures_are_retryable() {
    assert!(fetch_failed("v2", 1, "timeout").is_retryable());
    assert!(!artifact_not_found("v2", "x").is_retryable());
    assert!(!malformed("v2", "x").is_retryable());
}
