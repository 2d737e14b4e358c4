//! Field types, constraint sets and their compatibility rules
//!
//! Two relations matter to reconciliation:
//!
//! - *widening*: an upstream change from `old` to `new` accepts every value
//!   `old` accepted (e.g. `integer -> number`, a dropped `required`). Anything
//!   built on top of the old field keeps working.
//! - *contradiction*: two definitions sharing a mount point cannot both hold
//!   (different types, disjoint ranges, different patterns).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};

/// Type tag of a schema field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Boolean,
    Integer,
    Number,
    String,
    Date,
    Object,
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Object)
    }

    /// Whether changing a field from `self` to `new` keeps every old value valid
    pub fn widens_to(&self, new: &FieldType) -> bool {
        if self == new {
            return true;
        }
        match (self, new) {
            (FieldType::Integer, FieldType::Number) | (FieldType::Date, FieldType::String) => true,
            (FieldType::Array(old), FieldType::Array(new)) => old.widens_to(new),
            // A single value becomes a list of values
            (old, FieldType::Array(new)) => old.widens_to(new),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Number => f.write_str("number"),
            FieldType::String => f.write_str("string"),
            FieldType::Date => f.write_str("date"),
            FieldType::Object => f.write_str("object"),
            FieldType::Array(item) => write!(f, "array<{item}>"),
        }
    }
}

impl FromStr for FieldType {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix("array<").and_then(|r| r.strip_suffix('>')) {
            return Ok(FieldType::Array(Box::new(inner.parse()?)));
        }
        match s {
            "boolean" => Ok(FieldType::Boolean),
            "integer" => Ok(FieldType::Integer),
            "number" => Ok(FieldType::Number),
            "string" => Ok(FieldType::String),
            "date" => Ok(FieldType::Date),
            "object" => Ok(FieldType::Object),
            other => Err(OverlayError::ConfigInvalid {
                message: format!(
                    "unknown field type '{other}' (expected boolean, integer, number, string, date, object or array<T>)"
                ),
            }),
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        ty.to_string()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Validation constraints attached to a field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<BTreeSet<String>>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reasons why `new` rejects values `self` accepted; empty when `new` is
    /// equal or looser
    pub fn narrowing(&self, new: &Constraints) -> Vec<String> {
        let mut reasons = Vec::new();

        if !self.required && new.required {
            reasons.push("field became required".to_string());
        }
        if raised(self.min_length, new.min_length) {
            reasons.push(format!(
                "min_length raised to {}",
                new.min_length.unwrap_or_default()
            ));
        }
        if lowered(self.max_length, new.max_length) {
            reasons.push(format!(
                "max_length lowered to {}",
                new.max_length.unwrap_or_default()
            ));
        }
        if raised(self.minimum, new.minimum) {
            reasons.push(format!("minimum raised to {}", new.minimum.unwrap_or_default()));
        }
        if lowered(self.maximum, new.maximum) {
            reasons.push(format!("maximum lowered to {}", new.maximum.unwrap_or_default()));
        }
        if let Some(pattern) = &new.pattern {
            if self.pattern.as_ref() != Some(pattern) {
                reasons.push(format!("pattern changed to '{pattern}'"));
            }
        }
        match (&self.one_of, &new.one_of) {
            (None, Some(_)) => reasons.push("value set introduced".to_string()),
            (Some(old), Some(new)) => {
                let dropped: Vec<&str> = old.difference(new).map(String::as_str).collect();
                if !dropped.is_empty() {
                    reasons.push(format!("values removed: {}", dropped.join(", ")));
                }
            }
            _ => {}
        }

        reasons
    }

    /// Why two constraint sets cannot hold for the same field at once
    pub fn contradiction(&self, other: &Constraints) -> Option<String> {
        if disjoint(
            self.min_length,
            self.max_length,
            other.min_length,
            other.max_length,
        ) {
            return Some("length ranges do not overlap".to_string());
        }
        if disjoint(self.minimum, self.maximum, other.minimum, other.maximum) {
            return Some("value ranges do not overlap".to_string());
        }
        if let (Some(a), Some(b)) = (&self.pattern, &other.pattern) {
            if a != b {
                return Some(format!("patterns differ ('{a}' vs '{b}')"));
            }
        }
        if let (Some(a), Some(b)) = (&self.one_of, &other.one_of) {
            if a.is_disjoint(b) {
                return Some("value sets do not intersect".to_string());
            }
        }
        None
    }
}

/// A lower bound moved up (absent means unbounded)
fn raised<T: PartialOrd>(old: Option<T>, new: Option<T>) -> bool {
    match (old, new) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(old), Some(new)) => new > old,
    }
}

/// An upper bound moved down (absent means unbounded)
fn lowered<T: PartialOrd>(old: Option<T>, new: Option<T>) -> bool {
    match (old, new) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(old), Some(new)) => new < old,
    }
}

fn disjoint<T: PartialOrd + Copy>(
    a_min: Option<T>,
    a_max: Option<T>,
    b_min: Option<T>,
    b_max: Option<T>,
) -> bool {
    let below = |max: Option<T>, min: Option<T>| matches!((max, min), (Some(max), Some(min)) if max < min);
    below(a_max, b_min) || below(b_max, a_min)
}

/// Type, constraints and default of a field, without its name or children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub ty: FieldType,

    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FieldSpec {
    #[cfg(test)]
    pub fn new(ty: FieldType) -> Self {
        Self {
            ty,
            constraints: Constraints::default(),
            default: None,
        }
    }

    /// Why two definitions cannot share a mount point, `None` if they can
    pub fn conflict_with(&self, other: &FieldSpec) -> Option<String> {
        if self.ty != other.ty {
            return Some(format!("type {} vs {}", self.ty, other.ty));
        }
        self.constraints.contradiction(&other.constraints)
    }

    /// Reasons an upstream change from `self` to `new` breaks dependents
    pub fn narrowing(&self, new: &FieldSpec) -> Vec<String> {
        let mut reasons = Vec::new();
        if !self.ty.widens_to(&new.ty) {
            reasons.push(format!("type changed from {} to {}", self.ty, new.ty));
        }
        reasons.extend(self.constraints.narrowing(&new.constraints));
        reasons
    }
}
