/// Entity catalog: the declared entity types that field paths resolve against.
///
/// The catalog stands in for runtime type introspection. Each entity type lists its
/// scalar fields (mapped from result columns), its single-valued reference fields and
/// its collection fields, plus an optional key field.
pub mod config;
pub mod entity_schema;
pub mod errors;

pub use config::{EntityCatalogConfig, EntityDefinition, FieldDefinition};
pub use entity_schema::{EntityCatalog, EntityType, FieldKind, ScalarType};
pub use errors::CatalogError;
