//! Artifact caching system for overlay
//!
//! This module keeps fetched upstream artifacts on disk so a tag is never
//! fetched twice, and hosts the git clones used by git upstreams.
//!
//! ## Cache Structure
//!
//! ```text
//! ~/.cache/overlay/
//! ├── artifacts/
//! │   └── <source-slug>/
//! │       ├── index.json          # tag -> digest
//! │       └── <blake3-hex>.yaml   # raw schema documents
//! └── repos/
//!     └── <source-slug>/          # bare git clones
//! ```
//!
//! Artifacts are content-addressed: the file name is the BLAKE3 digest of the
//! bytes, verified on every read.

pub mod index;
pub mod stats;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, cache};
use crate::hash;

pub use index::ArtifactIndex;

/// Default cache directory name under user's cache directory
const CACHE_DIR: &str = "overlay";

/// Artifacts subdirectory within cache
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Git clones subdirectory within cache
pub const REPOS_DIR: &str = "repos";

/// Get the default cache directory path
///
/// Returns `~/.cache/overlay` on Unix or equivalent on other platforms.
///
/// Can be overridden with the `OVERLAY_CACHE_DIR` environment variable.
pub fn cache_dir() -> Result<PathBuf> {
    if let Ok(cache_dir) = std::env::var("OVERLAY_CACHE_DIR") {
        return Ok(PathBuf::from(cache_dir));
    }

    let base = dirs::cache_dir()
        .ok_or_else(|| cache::operation_failed("Could not determine cache directory"))?;

    Ok(base.join(CACHE_DIR))
}

/// Generate a cache key (slug) from a source description
///
/// Example: "git:https://github.com/org/repo.git" -> "git-github.com-org-repo"
pub fn source_slug(description: &str) -> String {
    description
        .replace("https://", "")
        .replace("http://", "")
        .replace("file://", "")
        .replace("git@", "")
        .replace([':', '/', '\\'], "-")
        .replace(".git", "")
        .trim_matches('-')
        .to_string()
}

/// On-disk, content-addressed artifact cache rooted at a directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache at the default location
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(cache_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(ARTIFACTS_DIR)
    }

    /// Directory for artifacts of one upstream source
    pub fn source_dir(&self, slug: &str) -> PathBuf {
        self.artifacts_dir().join(slug)
    }

    /// Directory for the git clone of one upstream source
    pub fn repo_dir(&self, slug: &str) -> PathBuf {
        self.root.join(REPOS_DIR).join(slug)
    }

    fn blob_path(&self, slug: &str, digest: &str) -> PathBuf {
        self.source_dir(slug)
            .join(format!("{}.yaml", hash::digest_hex(digest)))
    }

    /// Cached bytes for `tag`, if present and intact
    pub fn lookup(&self, slug: &str, tag: &str) -> Result<Option<Vec<u8>>> {
        let index = ArtifactIndex::load(&self.source_dir(slug))?;
        let Some(digest) = index.get(tag) else {
            return Ok(None);
        };

        let path = self.blob_path(slug, digest);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(tag, path = %path.display(), "cached artifact unreadable: {}", e);
                return Ok(None);
            }
        };

        if !hash::verify_bytes(&bytes, digest) {
            warn!(tag, digest, "cached artifact failed verification, refetching");
            return Ok(None);
        }

        debug!(tag, digest, "artifact served from disk cache");
        Ok(Some(bytes))
    }

    /// Store bytes for `tag`, returning their digest
    pub fn store(&self, slug: &str, tag: &str, bytes: &[u8]) -> Result<String> {
        let dir = self.source_dir(slug);
        fs::create_dir_all(&dir).map_err(|e| {
            cache::operation_failed(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let digest = hash::hash_bytes(bytes);
        let path = self.blob_path(slug, &digest);
        if !path.exists() {
            write_atomic(&dir, &path, bytes)?;
        }

        let mut index = ArtifactIndex::load(&dir)?;
        index.insert(tag, &digest);
        index.save(&dir)?;

        Ok(digest)
    }

    /// Remove everything cached
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .map_err(|e| cache::operation_failed(format!("Failed to clear cache: {}", e)))?;
        }
        Ok(())
    }

    /// Remove artifacts and clone of one source
    pub fn remove_source(&self, slug: &str) -> Result<()> {
        let mut removed = false;
        for dir in [self.source_dir(slug), self.repo_dir(slug)] {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| {
                    cache::operation_failed(format!("Failed to remove {}: {}", dir.display(), e))
                })?;
                removed = true;
            }
        }
        if !removed {
            return Err(cache::operation_failed(format!(
                "No cached source named '{}'",
                slug
            )));
        }
        Ok(())
    }
}

/// Write through a temp file in the same directory, then rename into place
pub fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        cache::operation_failed(format!("Failed to create temp file in {}: {}", dir.display(), e))
    })?;
    temp.write_all(bytes)
        .map_err(|e| cache::operation_failed(format!("Failed to write temp file: {}", e)))?;
    temp.persist(path).map_err(|e| {
        cache::operation_failed(format!("Failed to persist {}: {}", path.display(), e))
    })?;
    Ok(())
}
