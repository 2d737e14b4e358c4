use super::*;
use crate::diff::{DiffOptions, diff};
use crate::error::OverlayError;
use crate::ledger::{Extension, ExtensionStatus};
use crate::schema::{Constraints, Field, FieldSpec, FieldType};
use crate::test_fixtures::*;

fn spec(ty: &str) -> FieldSpec {
    FieldSpec::new(ty.parse::<FieldType>().unwrap())
}

fn additive(name: &str, mount: &str, ty: &str) -> Extension {
    Extension::new(name, path(mount), ExtensionKind::Additive, spec(ty))
}

fn overriding(name: &str, mount: &str, ty: &str) -> Extension {
    Extension::new(name, path(mount), ExtensionKind::Override, spec(ty))
}

/// Ledger with every extension applied against "v1"
fn applied(extensions: Vec<Extension>) -> OverlayLedger {
    let mut ledger = OverlayLedger::new();
    for ext in extensions {
        let name = ext.name.clone();
        ledger.add_extension(ext).unwrap();
        ledger.mark_applied(&name, "v1").unwrap();
    }
    ledger.set_base_tag("v1");
    ledger
}

fn run_with(
    ledger: &OverlayLedger,
    old: Schema,
    new: Schema,
    options: &ReconcileOptions,
) -> Reconciliation {
    let old = ArtifactVersion::from_schema("v1", old);
    let new = ArtifactVersion::from_schema("v2", new);
    let delta = diff(&old, &new, &DiffOptions::default());
    reconcile(ledger, &delta, &new, options).unwrap()
}

fn run(ledger: &OverlayLedger, old: Schema, new: Schema) -> Reconciliation {
    run_with(ledger, old, new, &ReconcileOptions::default())
}

fn metadata_mut(schema: &mut Schema) -> &mut Vec<Field> {
    schema.children_mut(&path("metadata")).unwrap()
}

/// base schema with `metadata.funding` renamed to `name`
fn funding_renamed(name: &str) -> Schema {
    let mut schema = base_schema();
    schema.get_mut(&path("metadata.funding")).unwrap().name = name.to_string();
    schema
}

fn outcome<'a>(rec: &'a Reconciliation, name: &str) -> &'a Outcome {
    rec.outcomes.iter().find(|o| o.extension == name).unwrap()
}

#[test]
fn test_untouched_mount_is_clean() {
    let ledger = applied(vec![additive(
        "county_code",
        "metadata.custom.county_code",
        "string",
    )]);
    let mut new = base_schema();
    metadata_mut(&mut new).push(leaf("version", "string"));

    let rec = run(&ledger, base_schema(), new);
    assert_eq!(outcome(&rec, "county_code").classification, Classification::Clean);
    assert!(rec.is_total());

    let field = rec.merged.get(&path("metadata.custom.county_code")).unwrap();
    assert_eq!(field.ty, FieldType::String);
    assert_eq!(field.overlay.as_deref(), Some("county_code"));

    let ext = rec.ledger.get("county_code").unwrap();
    assert_eq!(ext.applied_against.as_deref(), Some("v2"));
    assert_eq!(rec.ledger.base_tag.as_deref(), Some("v2"));
}

#[test]
fn test_renamed_parent_shifts_mount() {
    let ledger = applied(vec![additive("grant_id", "metadata.funding.grant_id", "string")]);

    let rec = run(&ledger, base_schema(), funding_renamed("award"));
    let out = outcome(&rec, "grant_id");
    assert_eq!(out.classification, Classification::Shifted);
    assert_eq!(out.previous_mount, path("metadata.funding.grant_id"));
    assert_eq!(out.mount, path("metadata.award.grant_id"));
    assert!(out.delta_entry.is_some());

    assert!(rec.merged.contains(&path("metadata.award.grant_id")));
    let ext = rec.ledger.get("grant_id").unwrap();
    assert_eq!(ext.mount, path("metadata.award.grant_id"));
    assert_eq!(ext.status, ExtensionStatus::Active);
}

#[test]
fn test_removed_parent_conflicts() {
    let ledger = applied(vec![additive("site_id", "metadata.site.site_id", "integer")]);
    let mut new = base_schema();
    metadata_mut(&mut new).retain(|f| f.name != "site");

    let rec = run(&ledger, base_schema(), new);
    assert_eq!(outcome(&rec, "site_id").classification, Classification::Conflicting);
    assert_eq!(rec.conflicts.len(), 1);
    assert_eq!(rec.conflicts[0].extension, "site_id");
    assert_eq!(rec.conflicts[0].kind, ConflictKind::MountRemoved);
    assert_eq!(rec.conflicts[0].resolution, Resolution::Manual);

    assert!(!rec.merged.contains(&path("metadata.site.site_id")));
    let ext = rec.ledger.get("site_id").unwrap();
    assert_eq!(ext.status, ExtensionStatus::Pending);
    assert_eq!(ext.applied_against.as_deref(), Some("v1"));

    assert!(matches!(
        rec.require_total().unwrap_err(),
        OverlayError::MergeIncomplete { count: 1, .. }
    ));
    assert!(rec.clone().accept(MergeMode::Total).is_err());
    let partial = rec.accept(MergeMode::Partial).unwrap();
    assert_eq!(partial.conflicts.len(), 1);
}

#[test]
fn test_conflict_beats_shift() {
    let mut old = base_schema();
    metadata_mut(&mut old).push(object("project", vec![]));
    old.children_mut(&path("metadata.funding"))
        .unwrap()
        .push(leaf("program", "string"));

    // funding moves under project and award_number narrows to integer
    let mut new = old.clone();
    let mut funding = {
        let fields = metadata_mut(&mut new);
        let index = fields.iter().position(|f| f.name == "funding").unwrap();
        fields.remove(index)
    };
    funding.fields[1].ty = FieldType::Integer;
    new.children_mut(&path("metadata.project")).unwrap().push(funding);

    let ledger = applied(vec![overriding(
        "award_number_override",
        "metadata.funding.award_number",
        "string",
    )]);
    let rec = run(&ledger, old, new);

    let out = outcome(&rec, "award_number_override");
    assert_eq!(out.classification, Classification::Conflicting);
    assert_eq!(rec.conflicts[0].kind, ConflictKind::IncompatibleChange);
}

#[test]
fn test_reconciling_same_tag_is_idempotent() {
    let ledger = applied(vec![
        additive("county_code", "metadata.custom.county_code", "string"),
        additive("grant_id", "metadata.funding.grant_id", "string"),
    ]);
    let first = run(&ledger, base_schema(), funding_renamed("award"));
    assert!(first.is_total());

    let v2 = ArtifactVersion::from_schema("v2", funding_renamed("award"));
    let delta = diff(&v2, &v2, &DiffOptions::default());
    assert!(delta.is_empty());

    let second = reconcile(&first.ledger, &delta, &v2, &ReconcileOptions::default()).unwrap();
    assert!(second.conflicts.is_empty());
    assert!(
        second
            .outcomes
            .iter()
            .all(|o| o.classification == Classification::Clean)
    );
    assert_eq!(second.merged, first.merged);
    assert_eq!(
        second.ledger.list_extensions(),
        first.ledger.list_extensions()
    );
}

#[test]
fn test_every_live_extension_is_classified_once() {
    let mut ledger = applied(vec![
        additive("county_code", "metadata.custom.county_code", "string"),
        additive("grant_id", "metadata.funding.grant_id", "string"),
        additive("site_id", "metadata.site.site_id", "integer"),
        additive("old_field", "metadata.custom.old_field", "string"),
    ]);
    ledger.mark_retired("old_field").unwrap();

    let mut new = funding_renamed("award");
    metadata_mut(&mut new).retain(|f| f.name != "site");
    let rec = run(&ledger, base_schema(), new);

    let names: Vec<&str> = rec.outcomes.iter().map(|o| o.extension.as_str()).collect();
    assert_eq!(names, vec!["county_code", "grant_id", "site_id"]);
    assert_eq!(rec.ledger.len(), 4);
    assert_eq!(
        rec.ledger.get("old_field").unwrap(),
        ledger.get("old_field").unwrap()
    );
}

#[test]
fn test_classification_is_deterministic() {
    let ledger = applied(vec![
        additive("grant_id", "metadata.funding.grant_id", "string"),
        additive("site_id", "metadata.site.site_id", "integer"),
    ]);
    let a = run(&ledger, base_schema(), funding_renamed("award"));
    let b = run(&ledger, base_schema(), funding_renamed("award"));
    assert_eq!(a.outcomes, b.outcomes);
    assert_eq!(a.conflicts, b.conflicts);
}

#[test]
fn test_move_below_threshold_suggests_remount() {
    let ledger = applied(vec![additive("grant_id", "metadata.funding.grant_id", "string")]);
    let options = ReconcileOptions {
        move_threshold: 0.8,
    };

    let rec = run_with(&ledger, base_schema(), funding_renamed("award"), &options);
    assert_eq!(rec.conflicts[0].kind, ConflictKind::LowConfidenceMove);
    assert_eq!(
        rec.conflicts[0].resolution,
        Resolution::Remount {
            path: path("metadata.award.grant_id")
        }
    );
}

#[test]
fn test_ambiguous_move_conflicts() {
    let ledger = applied(vec![additive("grant_id", "metadata.funding.grant_id", "string")]);
    let mut new = funding_renamed("award_a");
    let mut twin = new.get(&path("metadata.award_a")).unwrap().clone();
    twin.name = "award_b".to_string();
    metadata_mut(&mut new).push(twin);

    let rec = run(&ledger, base_schema(), new);
    assert_eq!(rec.conflicts[0].kind, ConflictKind::AmbiguousMove);
    assert!(matches!(rec.conflicts[0].resolution, Resolution::Remount { .. }));
}

/// `metadata.site` holding eight leaves and an object `x`
fn site_schema() -> Schema {
    let mut fields: Vec<Field> = "abcdefgh"
        .chars()
        .map(|c| leaf(&c.to_string(), "string"))
        .collect();
    fields.push(object("x", vec![leaf("k", "string"), leaf("m", "integer")]));
    Schema::new(vec![object("metadata", vec![object("site", fields)])])
}

/// `site` renamed to each of `names`, with `x` renamed to `y` inside
fn site_split(names: &[&str]) -> Schema {
    let mut site = site_schema().get(&path("metadata.site")).unwrap().clone();
    site.fields.last_mut().unwrap().name = "y".to_string();
    let copies = names
        .iter()
        .map(|name| {
            let mut copy = site.clone();
            copy.name = (*name).to_string();
            copy
        })
        .collect();
    Schema::new(vec![object("metadata", copies)])
}

#[test]
fn test_ambiguous_parent_move_blocks_nested_shift() {
    let ledger = applied(vec![additive("note", "metadata.site.x.note", "string")]);

    let rec = run(&ledger, site_schema(), site_split(&["site_a", "site_b"]));
    let out = outcome(&rec, "note");
    assert_eq!(out.classification, Classification::Conflicting);
    assert_eq!(out.mount, path("metadata.site.x.note"));
    assert_eq!(rec.conflicts[0].kind, ConflictKind::AmbiguousMove);
    assert_eq!(
        rec.conflicts[0].resolution,
        Resolution::Remount {
            path: path("metadata.site_a.y.note")
        }
    );
    assert!(!rec.merged.contains(&path("metadata.site_a.y.note")));
    assert_eq!(rec.ledger.get("note").unwrap().status, ExtensionStatus::Pending);
}

#[test]
fn test_doubtful_parent_move_blocks_nested_shift() {
    let ledger = applied(vec![additive("note", "metadata.site.x.note", "string")]);

    // site -> site_a scores below the threshold, x -> y above it
    let rec = run(&ledger, site_schema(), site_split(&["site_a"]));
    let out = outcome(&rec, "note");
    assert_eq!(out.classification, Classification::Conflicting);
    assert_eq!(rec.conflicts[0].kind, ConflictKind::LowConfidenceMove);
    assert!(rec.conflicts[0].reason.contains("metadata.site "));
    assert_eq!(out.touched.len(), 2);
}

#[test]
fn test_dropped_upstream_field_orphans_additive_extension() {
    let ledger = applied(vec![additive("site_name", "metadata.site.site_name", "string")]);
    let mut new = base_schema();
    new.children_mut(&path("metadata.site")).unwrap().clear();

    let rec = run(&ledger, base_schema(), new);
    assert_eq!(
        outcome(&rec, "site_name").classification,
        Classification::OrphanedSafe
    );
    assert!(rec.is_total());
    let field = rec.merged.get(&path("metadata.site.site_name")).unwrap();
    assert_eq!(field.overlay.as_deref(), Some("site_name"));
}

#[test]
fn test_widening_under_override_is_clean() {
    let mut old = base_schema();
    metadata_mut(&mut old).push(leaf("count", "integer"));
    let mut new = base_schema();
    metadata_mut(&mut new).push(leaf("count", "number"));

    let ledger = applied(vec![overriding("count_required", "metadata.count", "integer")]);
    let rec = run(&ledger, old, new);
    let out = outcome(&rec, "count_required");
    assert_eq!(out.classification, Classification::Clean);
    assert!(out.delta_entry.is_some());
}

#[test]
fn test_narrowing_under_override_conflicts() {
    let mut new = base_schema();
    new.get_mut(&path("metadata.title")).unwrap().constraints = Constraints {
        required: true,
        max_length: Some(20),
        ..Constraints::default()
    };

    let ledger = applied(vec![overriding("title_override", "metadata.title", "string")]);
    let rec = run(&ledger, base_schema(), new);
    assert_eq!(rec.conflicts[0].kind, ConflictKind::IncompatibleChange);
    assert!(rec.conflicts[0].reason.contains("max_length"));
}

#[test]
fn test_parent_turned_leaf() {
    let ledger = applied(vec![additive("site_id", "metadata.site.site_id", "integer")]);
    let mut new = base_schema();
    let site = new.get_mut(&path("metadata.site")).unwrap();
    site.ty = FieldType::String;
    site.fields.clear();

    let rec = run(&ledger, base_schema(), new);
    assert_eq!(rec.conflicts[0].kind, ConflictKind::ParentNotObject);
}

#[test]
fn test_upstream_adds_field_at_mount() {
    let ledger = applied(vec![
        additive("county_code", "metadata.custom.county_code", "string"),
        additive("region", "metadata.custom.region", "string"),
    ]);
    let mut new = base_schema();
    let custom = new.children_mut(&path("metadata.custom")).unwrap();
    custom.push(leaf("county_code", "integer"));
    custom.push(leaf("region", "string"));

    let rec = run(&ledger, base_schema(), new);
    assert_eq!(outcome(&rec, "region").classification, Classification::Clean);
    assert_eq!(
        outcome(&rec, "county_code").classification,
        Classification::Conflicting
    );
    assert_eq!(rec.conflicts[0].kind, ConflictKind::UpstreamCollision);
    // The upstream definition survives
    assert_eq!(
        rec.merged.get(&path("metadata.custom.county_code")).unwrap().ty,
        FieldType::Integer
    );
}

#[test]
fn test_unapplied_extension_checked_against_new_schema() {
    let mut ledger = applied(vec![]);
    ledger
        .add_extension(additive("sector", "metadata.sector", "string"))
        .unwrap();
    ledger
        .add_extension(additive("lost", "metadata.nowhere.lost", "string"))
        .unwrap();

    let rec = run(&ledger, base_schema(), base_schema());
    assert_eq!(outcome(&rec, "sector").classification, Classification::Clean);
    assert_eq!(rec.conflicts.len(), 1);
    assert_eq!(rec.conflicts[0].kind, ConflictKind::UnresolvedMount);
    assert_eq!(rec.ledger.get("sector").unwrap().status, ExtensionStatus::Active);
}

#[test]
fn test_shift_onto_occupied_mount_collides() {
    let mut ledger = applied(vec![additive("grant_id", "metadata.funding.grant_id", "string")]);
    ledger
        .add_extension(additive("award_grant", "metadata.award.grant_id", "integer"))
        .unwrap();

    let rec = run(&ledger, base_schema(), funding_renamed("award"));
    assert_eq!(outcome(&rec, "grant_id").classification, Classification::Shifted);
    assert_eq!(rec.conflicts.len(), 1);
    assert_eq!(rec.conflicts[0].extension, "award_grant");
    assert_eq!(rec.conflicts[0].kind, ConflictKind::MountCollision);
}

#[test]
fn test_conflict_serialization() {
    let record = ConflictRecord {
        extension: "grant_id".to_string(),
        mount: path("metadata.funding.grant_id"),
        delta_entry: Some(0),
        kind: ConflictKind::LowConfidenceMove,
        reason: "moved".to_string(),
        resolution: Resolution::Remount {
            path: path("metadata.award.grant_id"),
        },
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["kind"], "low_confidence_move");
    assert_eq!(json["resolution"]["action"], "remount");
    assert_eq!(json["resolution"]["path"], "metadata.award.grant_id");
}
