//! Workspace configuration (overlay.yaml)
//!
//! Declares where upstream releases come from, tuning for the differ,
//! reconciler and artifact store, and the organization's extension
//! definitions. Every section except `upstream` has defaults.

pub mod extension;


use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artifact::StoreOptions;
use crate::artifact::store::{DEFAULT_BACKOFF, DEFAULT_CAPACITY, DEFAULT_MAX_ATTEMPTS};
use crate::diff::{DEFAULT_MOVE_FLOOR, DiffOptions};
use crate::error::{OverlayError, Result, config};
use crate::reconcile::{DEFAULT_MOVE_THRESHOLD, ReconcileOptions};

pub use extension::ExtensionDef;

/// Kind of upstream location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Git repository; releases are tags
    Git,
    /// Local directory with one sub-directory per tag
    Dir,
}

/// Where upstream releases come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    pub source: SourceKind,

    /// Repository URL, or a directory (relative to the workspace root)
    pub location: String,

    /// Schema document inside each release
    pub schema_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileSection {
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffSection {
    #[serde(default = "default_move_floor")]
    pub move_floor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_move_threshold() -> f64 {
    DEFAULT_MOVE_THRESHOLD
}

fn default_move_floor() -> f64 {
    DEFAULT_MOVE_FLOOR
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

#[allow(clippy::cast_possible_truncation)]
fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF.as_millis() as u64
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            move_threshold: default_move_threshold(),
        }
    }
}

impl Default for DiffSection {
    fn default() -> Self {
        Self {
            move_floor: default_move_floor(),
        }
    }
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Contents of overlay.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayConfig {
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub reconcile: ReconcileSection,

    #[serde(default)]
    pub diff: DiffSection,

    #[serde(default)]
    pub fetch: FetchSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub extensions: Vec<ExtensionDef>,
}

impl OverlayConfig {
    /// Parse and validate configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read overlay.yaml from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(config::not_found(path.display().to_string()));
        }
        let yaml = fs::read_to_string(path)
            .map_err(|e| crate::error::fs::read_failed(path.display().to_string(), e.to_string()))?;
        Self::from_yaml(&yaml).map_err(|err| match err {
            OverlayError::ConfigParseFailed { reason, .. } => {
                config::parse_failed(path.display().to_string(), reason)
            }
            other => other,
        })
    }

    /// Check value ranges and extension definitions
    pub fn validate(&self) -> Result<()> {
        if self.upstream.location.trim().is_empty() {
            return Err(config::invalid("upstream.location must not be empty"));
        }
        if self.upstream.schema_path.trim().is_empty() {
            return Err(config::invalid("upstream.schema_path must not be empty"));
        }
        if !(self.reconcile.move_threshold > 0.0 && self.reconcile.move_threshold <= 1.0) {
            return Err(config::invalid(format!(
                "reconcile.move_threshold must be in (0, 1], got {}",
                self.reconcile.move_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.diff.move_floor) {
            return Err(config::invalid(format!(
                "diff.move_floor must be in [0, 1], got {}",
                self.diff.move_floor
            )));
        }
        if self.fetch.max_attempts == 0 {
            return Err(config::invalid("fetch.max_attempts must be at least 1"));
        }
        if self.cache.capacity == 0 {
            return Err(config::invalid("cache.capacity must be at least 1"));
        }

        let mut names = HashSet::new();
        for def in &self.extensions {
            def.validate()?;
            if !names.insert(def.name.as_str()) {
                return Err(config::invalid(format!(
                    "extension '{}' is defined more than once",
                    def.name
                )));
            }
        }
        Ok(())
    }

    pub fn find_extension(&self, name: &str) -> Option<&ExtensionDef> {
        self.extensions.iter().find(|d| d.name == name)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            move_threshold: self.reconcile.move_threshold,
        }
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            move_floor: self.diff.move_floor,
        }
    }

    /// Store tuning; the disk cache is attached by the caller
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            capacity: self.cache.capacity,
            max_attempts: self.fetch.max_attempts,
            backoff: Duration::from_millis(self.fetch.backoff_ms),
            disk: None,
        }
    }
}
