//! Common test utilities for overlay integration tests
//!
//! Each [`TestWorkspace`] owns a temp directory holding the workspace, an
//! upstream (directory mirror or git repository) and a private artifact
//! cache, so tests never touch the user's cache.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use git2::{Repository, Signature};
use tempfile::TempDir;

/// Location of the schema document inside fixture upstreams
pub const SCHEMA_PATH: &str = "schema/metadata.yaml";

/// Starting release
pub const V1: &str = r"fields:
  - name: metadata
    type: object
    fields:
      - name: title
        type: string
        constraints:
          required: true
      - name: custom
        type: object
        fields:
          - name: keywords
            type: array<string>
      - name: funding
        type: object
        fields:
          - name: funder
            type: string
          - name: award_number
            type: string
      - name: site
        type: object
        fields:
          - name: site_name
            type: string
";

/// Unrelated addition only (`metadata.version`)
pub const V2_ADDITIVE: &str = r"fields:
  - name: metadata
    type: object
    fields:
      - name: title
        type: string
        constraints:
          required: true
      - name: version
        type: string
      - name: custom
        type: object
        fields:
          - name: keywords
            type: array<string>
      - name: funding
        type: object
        fields:
          - name: funder
            type: string
          - name: award_number
            type: string
      - name: site
        type: object
        fields:
          - name: site_name
            type: string
";

/// `metadata.funding` renamed to `metadata.award`
pub const V2_RENAMED: &str = r"fields:
  - name: metadata
    type: object
    fields:
      - name: title
        type: string
        constraints:
          required: true
      - name: custom
        type: object
        fields:
          - name: keywords
            type: array<string>
      - name: award
        type: object
        fields:
          - name: funder
            type: string
          - name: award_number
            type: string
      - name: site
        type: object
        fields:
          - name: site_name
            type: string
";

/// `metadata.site` removed
pub const V2_REMOVED: &str = r"fields:
  - name: metadata
    type: object
    fields:
      - name: title
        type: string
        constraints:
          required: true
      - name: custom
        type: object
        fields:
          - name: keywords
            type: array<string>
      - name: funding
        type: object
        fields:
          - name: funder
            type: string
          - name: award_number
            type: string
";

/// Extension definitions used by most tests
pub const EXTENSIONS: &str = r"extensions:
  - name: county_code
    mount: metadata.custom.county_code
    type: string
    constraints:
      max_length: 5
  - name: grant_id
    mount: metadata.funding.grant_id
    type: string
  - name: site_code
    mount: metadata.site.site_code
    type: string
";

/// A test workspace for integration tests
pub struct TestWorkspace {
    /// Temporary directory
    pub temp: TempDir,
    /// Path to workspace root
    pub path: PathBuf,
}

impl TestWorkspace {
    /// Create an empty workspace directory
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().join("workspace");
        fs::create_dir_all(&path).expect("Failed to create workspace directory");
        Self { temp, path }
    }

    /// Workspace over a directory mirror with one release per `(tag, doc)`
    pub fn with_dir_upstream(releases: &[(&str, &str)], extensions: &str) -> Self {
        let workspace = Self::new();
        for (tag, doc) in releases {
            workspace.add_dir_release(tag, doc);
        }
        workspace.write_config("dir", "../upstream", extensions);
        workspace
    }

    /// Workspace over a git repository with one tagged commit per release
    pub fn with_git_upstream(releases: &[(&str, &str)], extensions: &str) -> Self {
        let workspace = Self::new();
        Repository::init(workspace.upstream_path()).expect("Failed to init upstream repository");
        for (tag, doc) in releases {
            workspace.add_git_release(tag, doc);
        }
        workspace.write_config("git", "../upstream", extensions);
        workspace
    }

    /// Directory holding the upstream mirror or repository
    pub fn upstream_path(&self) -> PathBuf {
        self.temp.path().join("upstream")
    }

    /// Private artifact cache
    pub fn cache_path(&self) -> PathBuf {
        self.temp.path().join("cache")
    }

    /// Write overlay.yaml
    pub fn write_config(&self, source: &str, location: &str, extensions: &str) {
        self.write_file(
            "overlay.yaml",
            &format!(
                "upstream:\n  source: {source}\n  location: {location}\n  schema_path: {SCHEMA_PATH}\n{extensions}"
            ),
        );
    }

    /// Publish a release in the directory mirror
    pub fn add_dir_release(&self, tag: &str, doc: &str) {
        let file = self.upstream_path().join(tag).join(SCHEMA_PATH);
        fs::create_dir_all(file.parent().expect("schema path has a parent"))
            .expect("Failed to create release directory");
        fs::write(file, doc).expect("Failed to write schema document");
    }

    /// Commit and tag a release in the upstream repository
    pub fn add_git_release(&self, tag: &str, doc: &str) {
        let dir = self.upstream_path();
        let repo = Repository::open(&dir).expect("Failed to open upstream repository");
        let file = dir.join(SCHEMA_PATH);
        fs::create_dir_all(file.parent().expect("schema path has a parent"))
            .expect("Failed to create schema directory");
        fs::write(&file, doc).expect("Failed to write schema document");

        let mut index = repo.index().expect("Failed to open index");
        index
            .add_path(Path::new(SCHEMA_PATH))
            .expect("Failed to stage schema document");
        index.write().expect("Failed to write index");
        let tree = repo
            .find_tree(index.write_tree().expect("Failed to write tree"))
            .expect("Failed to find tree");

        let sig = Signature::now("Upstream", "upstream@example.com")
            .expect("Failed to create signature");
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let commit = repo
            .commit(Some("HEAD"), &sig, &sig, &format!("Release {tag}"), &tree, &parents)
            .expect("Failed to commit release");
        let object = repo.find_object(commit, None).expect("Failed to find commit");
        repo.tag_lightweight(tag, &object, false)
            .expect("Failed to tag release");
    }

    /// Write a file in workspace
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Read a file from workspace
    pub fn read_file(&self, path: &str) -> String {
        fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    /// Check if a file exists in workspace
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// The committed ledger as JSON
    pub fn ledger(&self) -> serde_json::Value {
        serde_json::from_str(&self.read_file(".overlay/overlay.lock")).expect("Invalid ledger JSON")
    }

    /// Ledger entry of one extension
    pub fn extension(&self, name: &str) -> serde_json::Value {
        self.ledger()["extensions"]
            .as_array()
            .expect("extensions is an array")
            .iter()
            .find(|e| e["name"] == name)
            .cloned()
            .unwrap_or_else(|| panic!("extension {name} not in ledger"))
    }

    /// `overlay` command running inside this workspace
    pub fn cmd(&self) -> Command {
        let mut cmd = overlay_cmd();
        cmd.current_dir(&self.path);
        cmd.env("OVERLAY_CACHE_DIR", self.cache_path());
        cmd
    }

    /// `overlay init <tag>`, asserting success
    pub fn init(&self, tag: &str) {
        self.cmd().args(["init", tag]).assert().success();
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// `overlay` command with developer overrides removed
#[allow(deprecated)]
pub fn overlay_cmd() -> Command {
    let mut cmd = Command::cargo_bin("overlay").expect("overlay binary is built");
    cmd.env_remove("OVERLAY_WORKSPACE");
    cmd.env_remove("OVERLAY_LOG");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}
