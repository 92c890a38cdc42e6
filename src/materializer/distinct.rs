//! Post-fold deduplication of child collections.
//!
//! Joins that fan out over two one-to-many children repeat each child once per row of
//! the other. Folding keeps those duplicates; these helpers drop them by key.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use crate::entity_catalog::EntityCatalog;

use super::entity::{Entity, EntityKey, FieldValue};
use super::errors::MaterializeError;
use super::field_path::FieldPath;

/// Hook applied to every reconstructed root after folding
pub type PostProcess = Arc<dyn Fn(&mut Entity) -> Result<(), MaterializeError> + Send + Sync>;

/// Keep only the first element per key in `entity.field`.
///
/// Elements for which `key_fn` yields `None` are always kept. A field that is absent,
/// null, empty or not a collection is left untouched.
pub fn distinct_by_key<K, F>(entity: &mut Entity, field: &str, key_fn: F)
where
    K: Eq + Hash,
    F: Fn(&Entity) -> Option<K>,
{
    let Some(FieldValue::Collection(items)) = entity.get_mut(field) else {
        return;
    };
    if items.is_empty() {
        return;
    }

    let before = items.len();
    let mut seen = HashSet::new();
    items.retain(|item| match key_fn(item) {
        Some(key) => seen.insert(key),
        None => true,
    });

    if items.len() != before {
        log::debug!(
            "Removed {} duplicate elements from `{}`",
            before - items.len(),
            field
        );
    }
}

/// [`distinct_by_key`] over every entity in a slice
pub fn distinct_by_key_all<K, F>(entities: &mut [Entity], field: &str, key_fn: F)
where
    K: Eq + Hash,
    F: Fn(&Entity) -> Option<K>,
{
    for entity in entities.iter_mut() {
        distinct_by_key(entity, field, &key_fn);
    }
}

/// Extractor reading a scalar key field
pub fn scalar_key(field: impl Into<String>) -> impl Fn(&Entity) -> Option<EntityKey> + Clone {
    let field = field.into();
    move |entity: &Entity| entity.scalar(&field).and_then(EntityKey::from_json)
}

/// Post-process hook deduplicating `field` on each root by the scalar `key_field`
pub fn distinct_by_key_hook(field: impl Into<String>, key_field: impl Into<String>) -> PostProcess {
    let field = field.into();
    let key_fn = scalar_key(key_field.into());
    Arc::new(move |entity: &mut Entity| -> Result<(), MaterializeError> {
        distinct_by_key(entity, &field, &key_fn);
        Ok(())
    })
}

/// Resolve `Field` or `Root.Field` to a collection member declared on `root_type`.
///
/// Deeper paths are rejected: the hooks deduplicate collections held directly by roots.
pub fn root_collection_field(
    catalog: &EntityCatalog,
    root_type: &str,
    path: &str,
) -> Result<String, MaterializeError> {
    let qualified = if path.contains('.') {
        path.to_string()
    } else {
        format!("{}.{}", root_type, path)
    };
    if qualified.split('.').count() != 2 {
        return Err(MaterializeError::invalid_path(
            path,
            "only collections declared on the root can be deduplicated",
        ));
    }

    let field_path = FieldPath::resolve(catalog, &qualified)?;
    if field_path.owner_type() != root_type {
        return Err(MaterializeError::invalid_path(
            path,
            format!("`{}` is not declared on root `{}`", path, root_type),
        ));
    }
    if !field_path.is_collection() {
        return Err(MaterializeError::invalid_path(
            path,
            format!("`{}` is not a collection", path),
        ));
    }
    Ok(field_path.field().to_string())
}
