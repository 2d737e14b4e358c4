//! Upstream artifact sources
//!
//! The upstream package is an external, read-only, occasionally unavailable
//! collaborator. A source only knows how to list tags and hand back the raw
//! bytes of the schema document at a tag; caching, retries and parsing live
//! in the store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, artifact};

/// Where upstream releases come from
pub trait UpstreamSource: Send + Sync {
    /// Human-readable identity; also namespaces the on-disk cache
    fn describe(&self) -> String;

    /// Raw schema document at `tag`
    ///
    /// Fails with `ArtifactNotFound` for unknown tags and `FetchFailed` for
    /// transient retrieval failures.
    fn fetch(&self, tag: &str) -> Result<Vec<u8>>;

    /// Available tags in natural version order
    fn list_tags(&self) -> Result<Vec<String>>;
}

/// A directory mirror with one sub-directory per tag
///
/// ```text
/// <root>/
/// ├── v11.0.0/<schema_path>
/// └── v12.0.0/<schema_path>
/// ```
#[derive(Debug, Clone)]
pub struct DirUpstream {
    root: PathBuf,
    schema_path: PathBuf,
}

impl DirUpstream {
    pub fn new(root: impl Into<PathBuf>, schema_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            schema_path: schema_path.into(),
        }
    }

    fn tag_dir(&self, tag: &str) -> Option<PathBuf> {
        let mut components = Path::new(tag).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.root.join(tag)),
            _ => None,
        }
    }
}

impl UpstreamSource for DirUpstream {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    fn fetch(&self, tag: &str) -> Result<Vec<u8>> {
        let dir = self
            .tag_dir(tag)
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| artifact::not_found(tag, self.describe()))?;

        let file = dir.join(&self.schema_path);
        fs::read(&file).map_err(|e| match e.kind() {
            ErrorKind::NotFound => artifact::malformed(
                tag,
                format!("schema document {} is missing", self.schema_path.display()),
            ),
            _ => artifact::fetch_failed(tag, 1, format!("{}: {e}", file.display())),
        })
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            artifact::fetch_failed("*", 1, format!("{}: {e}", self.root.display()))
        })?;

        let mut tags: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();

        super::sort_tags(&mut tags);
        Ok(tags)
    }
}
