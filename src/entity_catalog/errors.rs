//! # Entity Catalog Error Types
//!
//! Errors raised while loading, validating, or querying the entity catalog.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: Unknown entity types or fields
//! - **Definition Errors**: Reference/collection targets or keys that do not resolve
//! - **Configuration Errors**: File I/O and YAML parsing issues during catalog loading

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No entity type found for `{entity}`")]
    UnknownEntity { entity: String },
    #[error("Entity `{entity}` has no field `{field}`")]
    UnknownField { entity: String, field: String },
    #[error("Field `{entity}.{field}` targets undeclared entity type `{target}`")]
    InvalidTarget {
        entity: String,
        field: String,
        target: String,
    },
    #[error("Key `{key}` of entity `{entity}` must be a declared scalar field")]
    InvalidKey { entity: String, key: String },
    #[error("Duplicate entity type `{entity}`")]
    DuplicateEntity { entity: String },
    #[error("Failed to read catalog file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse catalog: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid catalog: {message}")]
    InvalidConfig { message: String },
}
