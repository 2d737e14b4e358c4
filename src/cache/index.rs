//! Cache index management
//!
//! Each cached source keeps an `index.json` mapping upstream tags to the
//! digest of the bytes fetched for them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, cache};

/// File name for the index inside a source directory
pub const INDEX_FILE: &str = "index.json";

/// Tag to digest mapping for one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactIndex {
    tags: BTreeMap<String, String>,
}

impl ArtifactIndex {
    /// Read the index in `dir`; a missing file is an empty index
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            cache::operation_failed(format!("Failed to read index file {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            cache::operation_failed(format!("Failed to parse index file {}: {}", path.display(), e))
        })
    }

    /// Write the index into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| cache::operation_failed(format!("Failed to serialize index: {}", e)))?;
        super::write_atomic(dir, &dir.join(INDEX_FILE), content.as_bytes())
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    pub fn insert(&mut self, tag: &str, digest: &str) {
        self.tags.insert(tag.to_string(), digest.to_string());
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_index_is_empty() {
        let temp = TempDir::new().unwrap();
        let index = ArtifactIndex::load(temp.path()).unwrap();
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut index = ArtifactIndex::default();
        index.insert("v2", "blake3:bb");
        index.insert("v1", "blake3:aa");
        index.save(temp.path()).unwrap();

        let loaded = ArtifactIndex::load(temp.path()).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.get("v1"), Some("blake3:aa"));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(INDEX_FILE), "{not json").unwrap();
        assert!(ArtifactIndex::load(temp.path()).is_err());
    }
}
