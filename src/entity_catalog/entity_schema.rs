use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::errors::CatalogError;

/// Declared type of a scalar column-backed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Integer,
    Float,
    String,
    Boolean,
    /// Any JSON value, passed through untouched
    Json,
}

impl ScalarType {
    /// Coerce a raw column value to this scalar type.
    ///
    /// ClickHouse quotes 64-bit integers in JSON output by default, so integer and
    /// float columns also accept numeric strings. Returns `None` when the value
    /// cannot represent this type. Callers handle JSON null before coercing.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ScalarType::Json, v) => Some(v.clone()),
            (ScalarType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Some(value.clone())
            }
            (ScalarType::Integer, Value::String(s)) => {
                if let Ok(i) = s.parse::<i64>() {
                    Some(Value::from(i))
                } else {
                    s.parse::<u64>().ok().map(Value::from)
                }
            }
            (ScalarType::Float, Value::Number(_)) => Some(value.clone()),
            (ScalarType::Float, Value::String(s)) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (ScalarType::String, Value::String(_)) => Some(value.clone()),
            (ScalarType::Boolean, Value::Bool(_)) => Some(value.clone()),
            // UInt8/Bool columns come back as 0/1
            (ScalarType::Boolean, Value::Number(n)) => match n.as_u64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::String => "string",
            ScalarType::Boolean => "boolean",
            ScalarType::Json => "json",
        };
        f.write_str(name)
    }
}

/// Resolved kind of an entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Single-valued child of the named entity type
    Reference(String),
    /// Ordered, duplicate-permitting collection of the named entity type
    Collection(String),
}

impl FieldKind {
    /// Entity type held by this field, if it holds entities at all
    pub fn element_type(&self) -> Option<&str> {
        match self {
            FieldKind::Scalar(_) => None,
            FieldKind::Reference(target) | FieldKind::Collection(target) => Some(target),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldKind::Collection(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, FieldKind::Scalar(_))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(scalar) => write!(f, "{}", scalar),
            FieldKind::Reference(target) => write!(f, "{}", target),
            FieldKind::Collection(target) => write!(f, "[{}]", target),
        }
    }
}

/// A declared entity type: its name, optional key field and ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    pub name: String,
    pub key: Option<String>,
    pub fields: IndexMap<String, FieldKind>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        EntityType {
            name: name.into(),
            key: None,
            fields: IndexMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_scalar(mut self, field: impl Into<String>, scalar: ScalarType) -> Self {
        self.fields.insert(field.into(), FieldKind::Scalar(scalar));
        self
    }

    pub fn with_reference(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldKind::Reference(target.into()));
        self
    }

    pub fn with_collection(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldKind::Collection(target.into()));
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    /// Find a scalar field by result-column name.
    ///
    /// Column names are matched case-insensitively and any table qualifier
    /// (`c.ChildId`) is ignored.
    pub fn scalar_field_for_column(&self, column: &str) -> Option<(&str, ScalarType)> {
        let column = unqualified_column(column);
        self.fields.iter().find_map(|(name, kind)| match kind {
            FieldKind::Scalar(scalar) if name.eq_ignore_ascii_case(column) => {
                Some((name.as_str(), *scalar))
            }
            _ => None,
        })
    }
}

/// Strip a `table.` qualifier from a result column name
pub fn unqualified_column(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

/// Registry of entity types used to resolve field paths and shape rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCatalog {
    pub name: Option<String>,
    entities: IndexMap<String, EntityType>,
}

impl EntityCatalog {
    /// Build a catalog from entity types, validating every cross-reference
    pub fn from_types(types: impl IntoIterator<Item = EntityType>) -> Result<Self, CatalogError> {
        let mut entities = IndexMap::new();
        for entity in types {
            if entities.contains_key(&entity.name) {
                return Err(CatalogError::DuplicateEntity {
                    entity: entity.name,
                });
            }
            entities.insert(entity.name.clone(), entity);
        }

        let catalog = EntityCatalog {
            name: None,
            entities,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Look up an entity type by name
    pub fn entity(&self, name: &str) -> Result<&EntityType, CatalogError> {
        self.entities
            .get(name)
            .ok_or_else(|| CatalogError::UnknownEntity {
                entity: name.to_string(),
            })
    }

    /// Look up a declared field of an entity type
    pub fn field_kind(&self, entity: &str, field: &str) -> Result<&FieldKind, CatalogError> {
        self.entity(entity)?
            .field(field)
            .ok_or_else(|| CatalogError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(|k| k.as_str())
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for entity in self.entities.values() {
            for (field, kind) in &entity.fields {
                if let Some(target) = kind.element_type() {
                    if !self.entities.contains_key(target) {
                        return Err(CatalogError::InvalidTarget {
                            entity: entity.name.clone(),
                            field: field.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }

            if let Some(key) = &entity.key {
                if !matches!(entity.fields.get(key), Some(FieldKind::Scalar(_))) {
                    return Err(CatalogError::InvalidKey {
                        entity: entity.name.clone(),
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
