//! Dot-separated paths into a schema tree

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};

/// Path of a field inside a schema tree, e.g. `metadata.custom.county_code`
///
/// The empty path is the root. Ordering is segment-wise, so a parent always
/// sorts before its children; this is the canonical path sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaPath {
    segments: Vec<String>,
}

impl SchemaPath {
    /// The root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            validate_segment(segment).map_err(|reason| OverlayError::InvalidPath {
                path: input.to_string(),
                reason,
            })?;
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last segment (the field name), `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<SchemaPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, name: &str) -> SchemaPath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// True when `prefix` equals this path or is one of its ancestors
    pub fn starts_with(&self, prefix: &SchemaPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Replace the `from` prefix with `to`
    ///
    /// Returns `None` when `from` is not a prefix of this path.
    pub fn rebase(&self, from: &SchemaPath, to: &SchemaPath) -> Option<SchemaPath> {
        let rest = self.segments.strip_prefix(from.segments.as_slice())?;
        let mut segments = to.segments.clone();
        segments.extend(rest.iter().cloned());
        Some(Self { segments })
    }
}

/// Check a single field name
pub fn validate_segment(segment: &str) -> std::result::Result<(), String> {
    if segment.is_empty() {
        return Err("empty segment".to_string());
    }
    if segment.trim() != segment {
        return Err(format!("segment '{segment}' has surrounding whitespace"));
    }
    if segment.contains('.') {
        return Err(format!("segment '{segment}' contains '.'"));
    }
    Ok(())
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for SchemaPath {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SchemaPath {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SchemaPath> for String {
    fn from(path: SchemaPath) -> Self {
        path.segments.join(".")
    }
}
