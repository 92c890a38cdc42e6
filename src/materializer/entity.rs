//! Materialized entities and their key values.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One materialized entity instance: its type name and ordered field values.
///
/// Serializes as a plain JSON object of its fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    #[serde(skip)]
    type_name: String,
    #[serde(flatten)]
    fields: IndexMap<String, FieldValue>,
}

/// Value held by an entity field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    /// Scalar column value; never JSON null
    Scalar(Value),
    /// Single-valued child
    Entity(Box<Entity>),
    /// Ordered child collection, duplicates permitted
    Collection(Vec<Entity>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            FieldValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Entity]> {
        match self {
            FieldValue::Collection(items) => Some(items),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            other => FieldValue::Scalar(other),
        }
    }
}

impl From<Entity> for FieldValue {
    fn from(entity: Entity) -> Self {
        FieldValue::Entity(Box::new(entity))
    }
}

impl From<Option<Entity>> for FieldValue {
    fn from(entity: Option<Entity>) -> Self {
        entity.map_or(FieldValue::Null, FieldValue::from)
    }
}

impl From<Vec<Entity>> for FieldValue {
    fn from(items: Vec<Entity>) -> Self {
        FieldValue::Collection(items)
    }
}

impl Entity {
    pub fn new(type_name: impl Into<String>) -> Self {
        Entity {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field assignment
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(field)
    }

    /// Set a field, returning the previous value
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn scalar(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(FieldValue::as_scalar)
    }

    pub fn child(&self, field: &str) -> Option<&Entity> {
        self.get(field).and_then(FieldValue::as_entity)
    }

    pub fn collection(&self, field: &str) -> Option<&[Entity]> {
        self.get(field).and_then(FieldValue::as_collection)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Project into a caller-defined type through its serde representation
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        self.to_typed()
    }
}

/// Hashable identity of a root entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntityKey {
    Int(i64),
    UInt(u64),
    Bool(bool),
    String(String),
}

impl EntityKey {
    /// Key for a scalar value. Floats, nulls, arrays and objects are not keys.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(EntityKey::Int)
                .or_else(|| n.as_u64().map(EntityKey::UInt)),
            Value::String(s) => Some(EntityKey::String(s.clone())),
            Value::Bool(b) => Some(EntityKey::Bool(*b)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            EntityKey::Int(i) => Value::from(*i),
            EntityKey::UInt(u) => Value::from(*u),
            EntityKey::Bool(b) => Value::Bool(*b),
            EntityKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Int(i) => write!(f, "{}", i),
            EntityKey::UInt(u) => write!(f, "{}", u),
            EntityKey::Bool(b) => write!(f, "{}", b),
            EntityKey::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for EntityKey {
    fn from(value: i32) -> Self {
        EntityKey::Int(value.into())
    }
}

impl From<i64> for EntityKey {
    fn from(value: i64) -> Self {
        EntityKey::Int(value)
    }
}

impl From<u64> for EntityKey {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(EntityKey::UInt(value), EntityKey::Int)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        EntityKey::String(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        EntityKey::String(value)
    }
}
