//! Shared catalog and canned results for the integration suite

use std::sync::Arc;

use clickfold::entity_catalog::EntityCatalog;
use clickfold::materializer::Entity;
use clickfold::row_source::memory::CannedResult;
use serde_json::Value;

pub const FAMILY_CATALOG: &str = r#"
name: family
entities:
  Parent:
    key: ParentId
    fields:
      ParentId: integer
      Name: string
      Children: { collection: Child }
      Pets: { collection: Pet }
      Owner: { reference: Person }
  Child:
    key: ChildId
    fields:
      ChildId: integer
      ParentId: integer
      Name: string
      Toy: { reference: Toy }
  Pet:
    key: PetId
    fields:
      PetId: integer
      Name: string
  Person:
    key: PersonId
    fields:
      PersonId: integer
      Name: string
  Toy:
    key: ToyId
    fields:
      ToyId: integer
      Label: string
"#;

pub fn family_catalog() -> Arc<EntityCatalog> {
    Arc::new(EntityCatalog::from_yaml_str(FAMILY_CATALOG).expect("family catalog is valid"))
}

pub fn canned(columns: &[&str], rows: Vec<Vec<Value>>) -> CannedResult {
    CannedResult::new(columns.iter().copied(), rows)
}

/// Scalar `field` of every element of collection `collection`, as i64
pub fn collection_ids(entity: &Entity, collection: &str, field: &str) -> Vec<i64> {
    entity
        .collection(collection)
        .unwrap_or_default()
        .iter()
        .filter_map(|e| e.scalar(field).and_then(Value::as_i64))
        .collect()
}

pub fn names(entity: &Entity, collection: &str) -> Vec<String> {
    entity
        .collection(collection)
        .unwrap_or_default()
        .iter()
        .filter_map(|e| e.scalar("Name").and_then(Value::as_str).map(String::from))
        .collect()
}
