//! Cache statistics and management
//!
//! This module provides functions for listing and getting statistics about
//! cached upstream sources.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Result, cache};

use super::{ArtifactIndex, DiskCache};

/// Cached upstream source information
#[derive(Debug, Clone)]
pub struct CachedSource {
    /// Source slug (e.g. "git-github.com-org-upstream")
    pub slug: String,
    /// Number of cached tags
    pub tags: usize,
    /// Whether a git clone is cached too
    pub has_clone: bool,
    /// Total size in bytes
    pub size: u64,
}

impl CachedSource {
    /// Format size as human-readable string
    pub fn formatted_size(&self) -> String {
        format_size(self.size)
    }
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of cached sources
    pub sources: usize,
    /// Number of cached tags across all sources
    pub tags: usize,
    /// Total size in bytes
    pub total_size: u64,
}

impl CacheStats {
    /// Format total size as human-readable string
    pub fn formatted_size(&self) -> String {
        format_size(self.total_size)
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    let size = bytes as f64;
    if size < 1024.0 {
        format!("{} B", bytes)
    } else if size < 1024.0 * 1024.0 {
        format!("{:.1} KB", size / 1024.0)
    } else if size < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", size / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", size / (1024.0 * 1024.0 * 1024.0))
    }
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

impl DiskCache {
    /// List all cached sources, sorted by slug
    pub fn list_sources(&self) -> Result<Vec<CachedSource>> {
        let mut slugs: Vec<String> = Vec::new();
        for parent in [self.artifacts_dir(), self.root().join(super::REPOS_DIR)] {
            if !parent.is_dir() {
                continue;
            }
            let entries = fs::read_dir(&parent).map_err(|e| {
                cache::operation_failed(format!("Failed to read {}: {}", parent.display(), e))
            })?;
            for entry in entries.filter_map(std::result::Result::ok) {
                if entry.path().is_dir() {
                    slugs.push(entry.file_name().to_string_lossy().to_string());
                }
            }
        }
        slugs.sort();
        slugs.dedup();

        slugs
            .into_iter()
            .map(|slug| {
                let source_dir = self.source_dir(&slug);
                let repo_dir = self.repo_dir(&slug);
                let tags = ArtifactIndex::load(&source_dir)?.len();
                Ok(CachedSource {
                    tags,
                    has_clone: repo_dir.is_dir(),
                    size: dir_size(&source_dir) + dir_size(&repo_dir),
                    slug,
                })
            })
            .collect()
    }

    /// Aggregate statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let sources = self.list_sources()?;
        Ok(CacheStats {
            sources: sources.len(),
            tags: sources.iter().map(|s| s.tags).sum(),
            total_size: sources.iter().map(|s| s.size).sum(),
        })
    }
}
