//! Test fixtures shared by unit tests.
//!
//! Schema builders keep tree literals short, and the git helpers build a
//! throwaway upstream repository with one tag per release.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_fixtures::*;
//!
//! #[test]
//! fn my_test() {
//!     let schema = base_schema();
//!     let title = schema.get(&path("metadata.title"));
//!
//!     let temp = create_temp_dir();
//!     init_git_upstream(temp.path(), &[("v1.0.0", V1_DOC)]);
//! }
//! ```

use std::fs;
use std::path::Path;

use git2::{Repository, Signature};
use tempfile::TempDir;

use crate::schema::{Constraints, Field, FieldType, Schema, SchemaPath};

/// Location of the schema document inside fixture upstreams
pub const SCHEMA_PATH: &str = "schema/metadata.yaml";

/// First fixture release; same tree as [`base_schema`]
pub const V1_DOC: &str = r"fields:
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

/// Second fixture release; `funding` moved to `grants`, `version` added
pub const V2_DOC: &str = r"fields:
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
      - name: grants
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

/// Create a temp directory.
///
/// # Panics
///
/// Panics if the temp directory cannot be created.
#[must_use]
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Parse a dotted path.
///
/// # Panics
///
/// Panics on an invalid path.
#[must_use]
pub fn path(p: &str) -> SchemaPath {
    SchemaPath::parse(p).expect("invalid fixture path")
}

/// A field without children.
///
/// # Panics
///
/// Panics on an unknown type name.
#[must_use]
pub fn leaf(name: &str, ty: &str) -> Field {
    Field::new(name, ty.parse::<FieldType>().expect("invalid fixture type"))
}

/// A required field without children.
#[must_use]
pub fn required(name: &str, ty: &str) -> Field {
    leaf(name, ty).with_constraints(Constraints {
        required: true,
        ..Constraints::default()
    })
}

/// An object field.
#[must_use]
pub fn object(name: &str, fields: Vec<Field>) -> Field {
    Field::new(name, FieldType::Object).with_fields(fields)
}

/// The tree of [`V1_DOC`].
#[must_use]
pub fn base_schema() -> Schema {
    Schema::new(vec![object(
        "metadata",
        vec![
            required("title", "string"),
            object("custom", vec![leaf("keywords", "array<string>")]),
            object(
                "funding",
                vec![leaf("funder", "string"), leaf("award_number", "string")],
            ),
            object("site", vec![leaf("site_name", "string")]),
        ],
    )])
}

/// Lay out a directory upstream at `dir` with one sub-directory per release.
///
/// # Panics
///
/// Panics if a file cannot be written.
pub fn init_dir_upstream(dir: &Path, releases: &[(&str, &str)]) {
    for (tag, doc) in releases {
        let file = dir.join(tag).join(SCHEMA_PATH);
        fs::create_dir_all(file.parent().expect("schema path has a parent"))
            .expect("Failed to create release directory");
        fs::write(&file, doc).expect("Failed to write schema document");
    }
}

/// Initialize a git repository at `dir` with one commit and tag per release.
///
/// # Panics
///
/// Panics if any git operation fails.
pub fn init_git_upstream(dir: &Path, releases: &[(&str, &str)]) {
    Repository::init(dir).expect("Failed to init git repository");
    for (tag, doc) in releases {
        add_git_release(dir, tag, doc);
    }
}

/// Commit `doc` as the schema document and tag the commit.
///
/// # Panics
///
/// Panics if any git operation fails.
pub fn add_git_release(dir: &Path, tag: &str, doc: &str) {
    let repo = Repository::open(dir).expect("Failed to open git repository");
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

    let sig = Signature::now("Upstream", "upstream@example.com").expect("Failed to create signature");
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    let commit = repo
        .commit(Some("HEAD"), &sig, &sig, &format!("Release {tag}"), &tree, &parents)
        .expect("Failed to commit release");

    let object = repo.find_object(commit, None).expect("Failed to find commit");
    repo.tag_lightweight(tag, &object, false)
        .expect("Failed to tag release");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::extract_schema;

    #[test]
    fn test_v1_doc_matches_base_schema() {
        assert_eq!(extract_schema("v1", V1_DOC.as_bytes()).unwrap(), base_schema());
    }

    #[test]
    fn test_init_git_upstream_tags_each_release() {
        let temp = create_temp_dir();
        init_git_upstream(temp.path(), &[("v1", V1_DOC), ("v2", V2_DOC)]);
        let repo = Repository::open(temp.path()).unwrap();
        let tags = repo.tag_names(None).unwrap();
        assert_eq!(tags.len(), 2);
    }
}
