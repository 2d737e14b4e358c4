//! Upstream artifact snapshots
//!
//! An [`ArtifactVersion`] is an immutable, tag-identified snapshot of the
//! upstream package's extensible schema surface. Snapshots come from an
//! [`UpstreamSource`] through the [`ArtifactStore`], which caches them.
//!
//! ## Artifact format
//!
//! The upstream schema document is YAML (or JSON) with a single `fields`
//! list; unknown top-level keys are ignored:
//!
//! ```yaml
//! fields:
//!   - name: metadata
//!     type: object
//!     fields:
//!       - name: title
//!         type: string
//!         constraints: { required: true }
//! ```

pub mod source;
pub mod store;

use std::cmp::Ordering;

use crate::error::{Result, artifact};
use crate::hash;
use crate::schema::Schema;

pub use source::{DirUpstream, UpstreamSource};
pub use store::{ArtifactStore, StoreOptions};

/// An immutable upstream snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactVersion {
    tag: String,
    digest: String,
    schema: Schema,
}

impl ArtifactVersion {
    /// Parse raw upstream bytes into a snapshot
    pub fn from_bytes(tag: &str, bytes: &[u8]) -> Result<Self> {
        let schema = extract_schema(tag, bytes)?;
        Ok(Self {
            tag: tag.to_string(),
            digest: hash::hash_bytes(bytes),
            schema,
        })
    }

    /// Build a snapshot from an already parsed schema
    #[cfg(test)]
    pub fn from_schema(tag: &str, schema: Schema) -> Self {
        let digest = serde_json::to_vec(&schema)
            .map(|bytes| hash::hash_bytes(&bytes))
            .unwrap_or_default();
        Self {
            tag: tag.to_string(),
            digest,
            schema,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Parse the extension surface of an upstream artifact
///
/// Fails with `MalformedArtifact` when the document is not a schema or breaks
/// structural rules (duplicate siblings, children under non-objects).
pub fn extract_schema(tag: &str, bytes: &[u8]) -> Result<Schema> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(artifact::malformed(tag, "artifact is empty"));
    }

    let schema: Schema =
        serde_yaml::from_slice(bytes).map_err(|e| artifact::malformed(tag, e.to_string()))?;
    schema
        .validate()
        .map_err(|reason| artifact::malformed(tag, reason))?;

    Ok(schema)
}

/// Order tags so that numeric runs compare by value (`v2.10` after `v2.9`)
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    let (mut a_runs, mut b_runs) = (runs(a), runs(b));
    loop {
        match (a_runs.next(), b_runs.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Split into maximal runs of digits and non-digits
fn runs(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map_or(rest.len(), |(i, _)| i);
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(run)
    })
}

/// Sort tags in natural version order
pub fn sort_tags(tags: &mut [String]) {
    tags.sort_by(|a, b| compare_tags(a, b));
}
