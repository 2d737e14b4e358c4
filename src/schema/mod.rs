//! Structural schema model
//!
//! A schema is an ordered tree of named fields. Upstream artifacts expose one,
//! extensions graft onto one, and the differ compares two of them.

pub mod path;
pub mod types;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

pub use path::SchemaPath;
pub use types::{Constraints, FieldSpec, FieldType};

/// A named field in a schema tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: FieldType,

    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Child fields (objects only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,

    /// Extension that contributed this field (merged schemas only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<String>,
}

impl Field {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            constraints: Constraints::default(),
            default: None,
            fields: Vec::new(),
            overlay: None,
        }
    }

    /// Build a field from an extension definition
    pub fn from_spec(name: impl Into<String>, spec: &FieldSpec) -> Self {
        Self {
            name: name.into(),
            ty: spec.ty.clone(),
            constraints: spec.constraints.clone(),
            default: spec.default.clone(),
            fields: Vec::new(),
            overlay: None,
        }
    }

    #[cfg(test)]
    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    #[cfg(test)]
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn spec(&self) -> FieldSpec {
        FieldSpec {
            ty: self.ty.clone(),
            constraints: self.constraints.clone(),
            default: self.default.clone(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Type and constraints are equal (children and defaults are not compared)
    pub fn same_shape(&self, other: &Field) -> bool {
        self.ty == other.ty && self.constraints == other.constraints
    }

    /// `(relative path, type)` of every descendant
    pub fn descendant_signatures(&self) -> BTreeSet<(String, String)> {
        let mut out = BTreeSet::new();
        collect_signatures(&self.fields, "", &mut out);
        out
    }
}

fn collect_signatures(fields: &[Field], prefix: &str, out: &mut BTreeSet<(String, String)>) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        out.insert((path.clone(), field.ty.to_string()));
        collect_signatures(&field.fields, &path, out);
    }
}

/// An ordered tree of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Schema {
    #[cfg(test)]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Look up the field at `path`; the root has no field
    pub fn get(&self, path: &SchemaPath) -> Option<&Field> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.iter().find(|f| &f.name == first)?;
        for segment in rest {
            current = current.child(segment)?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, path: &SchemaPath) -> Option<&mut Field> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.iter_mut().find(|f| &f.name == first)?;
        for segment in rest {
            current = current.fields.iter_mut().find(|f| &f.name == segment)?;
        }
        Some(current)
    }

    #[cfg(test)]
    pub fn contains(&self, path: &SchemaPath) -> bool {
        self.get(path).is_some()
    }

    /// Mutable child list at `path` (the root or an object field)
    pub fn children_mut(&mut self, path: &SchemaPath) -> Option<&mut Vec<Field>> {
        if path.is_root() {
            return Some(&mut self.fields);
        }
        let field = self.get_mut(path)?;
        if field.ty.is_object() {
            Some(&mut field.fields)
        } else {
            None
        }
    }

    /// Structural checks applied to every parsed upstream schema
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_fields(&self.fields, &SchemaPath::root())
    }
}

fn validate_fields(fields: &[Field], prefix: &SchemaPath) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    for field in fields {
        let path = prefix.child(&field.name);
        path::validate_segment(&field.name).map_err(|reason| format!("field '{path}': {reason}"))?;
        if !seen.insert(field.name.as_str()) {
            return Err(format!("duplicate field '{path}'"));
        }
        if !field.ty.is_object() && !field.fields.is_empty() {
            return Err(format!("field '{path}' has children but is of type {}", field.ty));
        }
        validate_fields(&field.fields, &path)?;
    }
    Ok(())
}
