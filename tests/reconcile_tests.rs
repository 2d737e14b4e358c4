//! End-to-end reconciliation scenarios over a directory upstream

mod common;

use common::{EXTENSIONS, TestWorkspace, V1, V2_ADDITIVE, V2_REMOVED, V2_RENAMED};
use predicates::prelude::*;

fn workspace() -> TestWorkspace {
    let workspace = TestWorkspace::with_dir_upstream(
        &[
            ("v1", V1),
            ("v2-additive", V2_ADDITIVE),
            ("v2-renamed", V2_RENAMED),
            ("v2-removed", V2_REMOVED),
        ],
        EXTENSIONS,
    );
    workspace.init("v1");
    workspace
}

#[test]
fn test_unrelated_upstream_change_is_clean() {
    let workspace = workspace();

    workspace
        .cmd()
        .args(["reconcile", "v2-additive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reconciled v1 -> v2-additive"))
        .stdout(predicate::str::contains("3 clean, 0 shifted, 0 orphaned, 0 conflicting"))
        .stdout(predicate::str::contains("metadata.version"));

    let ledger = workspace.ledger();
    assert_eq!(ledger["base_tag"], "v2-additive");
    assert_eq!(workspace.extension("county_code")["applied_against"], "v2-additive");
    assert_eq!(workspace.extension("county_code")["status"], "active");
}

#[test]
fn test_renamed_parent_shifts_extension() {
    let workspace = workspace();

    workspace
        .cmd()
        .args(["reconcile", "v2-renamed", "--merged", "merged.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "metadata.funding.grant_id -> metadata.award.grant_id",
        ))
        .stdout(predicate::str::contains("2 clean, 1 shifted"));

    let grant = workspace.extension("grant_id");
    assert_eq!(grant["mount"], "metadata.award.grant_id");
    assert_eq!(grant["status"], "active");

    let merged = workspace.read_file("merged.yaml");
    assert!(merged.contains("name: award"));
    assert!(merged.contains("overlay: grant_id"));
}

#[test]
fn test_removed_parent_conflicts_with_exit_code_2() {
    let workspace = workspace();

    workspace
        .cmd()
        .args(["reconcile", "v2-removed", "--report", "report.json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("mount_removed"))
        .stdout(predicate::str::contains("1 conflicting"))
        .stderr(predicate::str::contains("incomplete"));

    // Partial merge is committed; the conflicting extension waits
    assert_eq!(workspace.ledger()["base_tag"], "v2-removed");
    let site = workspace.extension("site_code");
    assert_eq!(site["status"], "pending");
    assert_eq!(site["mount"], "metadata.site.site_code");
    assert_eq!(workspace.extension("county_code")["status"], "active");

    let report: serde_json::Value =
        serde_json::from_str(&workspace.read_file("report.json")).unwrap();
    assert_eq!(report["report_version"], 1);
    assert_eq!(report["summary"]["conflicting"], 1);
    let conflict = report["entries"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["extension"] == "site_code")
        .unwrap();
    assert_eq!(conflict["classification"], "conflicting");
    assert_eq!(conflict["conflict"], "mount_removed");
    assert_eq!(conflict["delta_entry"]["kind"], "removed");
}

#[test]
fn test_require_total_commits_nothing() {
    let workspace = workspace();
    let before = workspace.read_file(".overlay/overlay.lock");

    workspace
        .cmd()
        .args([
            "reconcile",
            "v2-removed",
            "--require-total",
            "--report",
            "report.json",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("ledger not committed"));

    assert_eq!(workspace.read_file(".overlay/overlay.lock"), before);
    assert!(workspace.file_exists("report.json"));
}

#[test]
fn test_dry_run_leaves_ledger_alone() {
    let workspace = workspace();
    let before = workspace.read_file(".overlay/overlay.lock");

    workspace
        .cmd()
        .args(["reconcile", "v2-renamed", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 shifted"))
        .stdout(predicate::str::contains("Dry run"));

    assert_eq!(workspace.read_file(".overlay/overlay.lock"), before);
}

#[test]
fn test_json_report_on_stdout() {
    let workspace = workspace();

    let output = workspace
        .cmd()
        .args(["reconcile", "v2-renamed", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["from_tag"], "v1");
    assert_eq!(report["to_tag"], "v2-renamed");
    assert_eq!(report["summary"]["shifted"], 1);
}

#[test]
fn test_reconcile_twice_is_idempotent() {
    let workspace = workspace();
    workspace
        .cmd()
        .args(["reconcile", "v2-renamed"])
        .assert()
        .success();
    let first = workspace.ledger();

    workspace
        .cmd()
        .args(["reconcile", "v2-renamed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 clean, 0 shifted"));

    let second = workspace.ledger();
    assert_eq!(first["extensions"], second["extensions"]);
    assert_eq!(second["base_tag"], "v2-renamed");
}

#[test]
fn test_remount_resolves_conflict() {
    let workspace = workspace();
    workspace
        .cmd()
        .args(["reconcile", "v2-removed"])
        .assert()
        .code(2);

    workspace
        .cmd()
        .args(["remount", "site_code", "metadata.custom.site_code"])
        .assert()
        .success();

    workspace
        .cmd()
        .args(["reconcile", "v2-removed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 conflicting"));

    let site = workspace.extension("site_code");
    assert_eq!(site["status"], "active");
    assert_eq!(site["mount"], "metadata.custom.site_code");
    assert_eq!(site["applied_against"], "v2-removed");
}

#[test]
fn test_retired_extension_is_not_replayed() {
    let workspace = workspace();
    workspace
        .cmd()
        .args(["retire", "site_code", "-y"])
        .assert()
        .success();

    workspace
        .cmd()
        .args(["reconcile", "v2-removed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("site_code").not());

    assert_eq!(workspace.extension("site_code")["status"], "retired");
}

#[test]
fn test_move_threshold_override() {
    let workspace = workspace();

    // A rename scores 0.7 + 0.3 * name similarity; demand near certainty
    workspace
        .cmd()
        .args(["reconcile", "v2-renamed", "--move-threshold", "0.99", "--dry-run"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("low_confidence_move"));

    workspace
        .cmd()
        .args(["reconcile", "v2-renamed", "--move-threshold", "1.5"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--move-threshold"));
}
