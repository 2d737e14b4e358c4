//! Grafting extensions onto the new upstream tree

use crate::ledger::{Extension, ExtensionKind};
use crate::schema::{Field, Schema, SchemaPath};

/// Apply `ext` at `mount`, tagging the touched field with the extension name
pub(crate) fn graft(
    schema: &mut Schema,
    ext: &Extension,
    mount: &SchemaPath,
) -> std::result::Result<(), String> {
    let name = mount
        .name()
        .ok_or_else(|| "cannot graft at the root".to_string())?;

    match ext.kind {
        ExtensionKind::Additive => {
            let parent = mount.parent().unwrap_or_default();
            let siblings = schema
                .children_mut(&parent)
                .ok_or_else(|| format!("{parent} cannot hold fields"))?;
            match siblings.iter_mut().find(|f| f.name == name) {
                // Compatible upstream field already there; it keeps its definition
                Some(existing) => {
                    existing.overlay.get_or_insert_with(|| ext.name.clone());
                }
                None => {
                    let mut field = Field::from_spec(name, &ext.field);
                    field.overlay = Some(ext.name.clone());
                    siblings.push(field);
                }
            }
        }
        ExtensionKind::Override => {
            let field = schema
                .get_mut(mount)
                .ok_or_else(|| format!("{mount} does not exist"))?;
            field.ty = ext.field.ty.clone();
            field.constraints = ext.field.constraints.clone();
            field.default = ext.field.default.clone();
            field.overlay = Some(ext.name.clone());
        }
    }
    Ok(())
}
