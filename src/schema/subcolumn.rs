//! Subcolumn access for composite columns.
//!
//! A subcolumn is addressed by a `.`-separated path through nested
//! `Struct` columns (`point.x`, `a.b.c`). Extraction hands back the child
//! `ArrayRef`, so the parent's buffers are shared, never copied.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, StructArray},
    datatypes::{DataType, Field, FieldRef},
};

/// Separator between a storage column name and its subcolumn path.
pub(crate) const SUBCOLUMN_SEPARATOR: char = '.';

/// Resolve the field reached by `path` inside `parent`.
///
/// The returned field is named after the last path segment. It is nullable
/// when any ancestor on the path is nullable, since a null parent slot leaves
/// the child value unspecified.
pub(crate) fn subcolumn_field<'a>(
    parent: &Field,
    path: impl IntoIterator<Item = &'a str>,
) -> Option<FieldRef> {
    let mut nullable = parent.is_nullable();
    let mut data_type = parent.data_type();
    let mut current: Option<&FieldRef> = None;

    for segment in path {
        let DataType::Struct(fields) = data_type else {
            return None;
        };
        let (_, child) = fields.find(segment)?;
        nullable |= child.is_nullable();
        data_type = child.data_type();
        current = Some(child);
    }

    current.map(|field| Arc::new(field.as_ref().clone().with_nullable(nullable)))
}

/// Extract the child array reached by `path` inside `parent`.
pub(crate) fn extract_subcolumn<'a>(
    parent: &ArrayRef,
    path: impl IntoIterator<Item = &'a str>,
) -> Option<ArrayRef> {
    let mut current = Arc::clone(parent);
    for segment in path {
        let child = {
            let struct_array = current.as_any().downcast_ref::<StructArray>()?;
            Arc::clone(struct_array.column_by_name(segment)?)
        };
        current = child;
    }
    Some(current)
}
