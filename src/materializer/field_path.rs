//! Field path resolution.
//!
//! A field path names an entity-valued member by dotted accessor text:
//!
//! - `Parent.Children`: member `Children` declared on `Parent`
//! - `Parent.Owner.Address`: member `Address` declared on the element type of
//!   `Parent.Owner`; the intermediate segment only locates the owner type
//!
//! Resolution happens once per configuration. The resolved descriptor then reads and
//! writes the field on materialized entities without further catalog lookups.

use crate::entity_catalog::{EntityCatalog, FieldKind, ScalarType};

use super::entity::{Entity, EntityKey, FieldValue};
use super::errors::MaterializeError;

/// Resolved descriptor of an entity-valued field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    path: String,
    owner_type: String,
    field: String,
    value_type: FieldKind,
    element_type: String,
}

impl FieldPath {
    pub fn resolve(catalog: &EntityCatalog, path: &str) -> Result<Self, MaterializeError> {
        let segments = split_path(path)?;
        let (owner_type, member) = match segments.as_slice() {
            [owner, member] => (owner.to_string(), *member),
            [root, intermediate, member] => {
                let root_type = entity_or_invalid(catalog, path, root)?;
                let intermediate_kind = root_type.field(intermediate).ok_or_else(|| {
                    MaterializeError::invalid_path(
                        path,
                        format!("`{}` has no member `{}`", root, intermediate),
                    )
                })?;
                let owner = intermediate_kind.element_type().ok_or_else(|| {
                    MaterializeError::invalid_path(
                        path,
                        format!(
                            "intermediate member `{}.{}` is scalar and cannot own `{}`",
                            root, intermediate, member
                        ),
                    )
                })?;
                (owner.to_string(), *member)
            }
            _ => {
                return Err(MaterializeError::invalid_path(
                    path,
                    "expected `Owner.Field` or `Owner.Field.SubField`",
                ))
            }
        };

        entity_or_invalid(catalog, path, &owner_type)?;
        let value_type = catalog
            .field_kind(&owner_type, member)
            .cloned()
            .map_err(|e| MaterializeError::invalid_path(path, e.to_string()))?;
        let element_type = value_type
            .element_type()
            .ok_or_else(|| {
                MaterializeError::invalid_path(
                    path,
                    format!(
                        "`{}.{}` is a scalar field and cannot hold a child entity",
                        owner_type, member
                    ),
                )
            })?
            .to_string();

        Ok(FieldPath {
            path: path.to_string(),
            owner_type,
            field: member.to_string(),
            value_type,
            element_type,
        })
    }

    /// Original accessor text
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// Member name on the owner type
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value_type(&self) -> &FieldKind {
        &self.value_type
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn is_collection(&self) -> bool {
        self.value_type.is_collection()
    }

    pub fn get<'a>(&self, owner: &'a Entity) -> Option<&'a FieldValue> {
        owner.get(&self.field)
    }

    pub fn get_mut<'a>(&self, owner: &'a mut Entity) -> Option<&'a mut FieldValue> {
        owner.get_mut(&self.field)
    }

    pub fn set(&self, owner: &mut Entity, value: impl Into<FieldValue>) -> Option<FieldValue> {
        owner.set(self.field.clone(), value)
    }
}

/// Resolved accessor for a root's scalar key field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAccessor {
    owner_type: String,
    field: String,
    scalar_type: ScalarType,
}

impl KeyAccessor {
    /// Resolve `"Owner.Field"`; the member must be scalar
    pub fn resolve(catalog: &EntityCatalog, path: &str) -> Result<Self, MaterializeError> {
        let segments = split_path(path)?;
        let [owner_type, field] = segments.as_slice() else {
            return Err(MaterializeError::invalid_path(
                path,
                "key accessor must be `Owner.Field`",
            ));
        };

        let owner = entity_or_invalid(catalog, path, owner_type)?;
        match owner.field(field) {
            Some(FieldKind::Scalar(scalar_type)) => Ok(KeyAccessor {
                owner_type: owner_type.to_string(),
                field: field.to_string(),
                scalar_type: *scalar_type,
            }),
            Some(_) => Err(MaterializeError::invalid_path(
                path,
                "key field must be scalar",
            )),
            None => Err(MaterializeError::invalid_path(
                path,
                format!("`{}` has no member `{}`", owner_type, field),
            )),
        }
    }

    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Read the key value from a materialized entity
    pub fn extract(&self, entity: &Entity) -> Result<EntityKey, MaterializeError> {
        let fail = |reason: &str| MaterializeError::KeyExtractionError {
            entity: entity.type_name().to_string(),
            key: self.field.clone(),
            reason: reason.to_string(),
        };

        match entity.get(&self.field) {
            None => Err(fail("key field is missing")),
            Some(FieldValue::Null) => Err(fail("key field is null")),
            Some(FieldValue::Scalar(value)) => {
                EntityKey::from_json(value).ok_or_else(|| fail("key value is not hashable"))
            }
            Some(_) => Err(fail("key field holds an entity")),
        }
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, MaterializeError> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(MaterializeError::invalid_path(path, "empty path segment"));
    }
    Ok(segments)
}

fn entity_or_invalid<'c>(
    catalog: &'c EntityCatalog,
    path: &str,
    name: &str,
) -> Result<&'c crate::entity_catalog::EntityType, MaterializeError> {
    catalog
        .entity(name)
        .map_err(|_| MaterializeError::invalid_path(path, format!("unknown entity type `{}`", name)))
}
