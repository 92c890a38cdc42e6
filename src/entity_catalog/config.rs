/// Entity catalog configuration management.
///
/// Entity catalogs are defined in YAML with the following structure:
///
/// ```yaml
/// name: blog                  # Optional catalog name
/// entities:
///   Post:
///     key: PostId             # Optional key field (used as default split column)
///     fields:
///       PostId: integer       # Scalar: integer | float | string | boolean | json
///       Title: string
///       Author: { reference: User }      # Single-valued child
///       Comments: { collection: Comment } # Collection child
/// ```
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::entity_schema::{EntityCatalog, EntityType, FieldKind, ScalarType};
use super::errors::CatalogError;

/// Catalog configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCatalogConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub entities: IndexMap<String, EntityDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDefinition {
    Scalar(ScalarType),
    Reference { reference: String },
    Collection { collection: String },
}

impl From<FieldDefinition> for FieldKind {
    fn from(def: FieldDefinition) -> Self {
        match def {
            FieldDefinition::Scalar(scalar) => FieldKind::Scalar(scalar),
            FieldDefinition::Reference { reference } => FieldKind::Reference(reference),
            FieldDefinition::Collection { collection } => FieldKind::Collection(collection),
        }
    }
}

impl EntityCatalogConfig {
    /// Load catalog configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|e| CatalogError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse catalog configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Convert into a validated catalog
    pub fn into_catalog(self) -> Result<EntityCatalog, CatalogError> {
        if self.entities.is_empty() {
            return Err(CatalogError::InvalidConfig {
                message: "Catalog must contain at least one entity definition".to_string(),
            });
        }

        let types = self.entities.into_iter().map(|(name, def)| EntityType {
            name,
            key: def.key,
            fields: def
                .fields
                .into_iter()
                .map(|(field, kind)| (field, FieldKind::from(kind)))
                .collect(),
        });

        let mut catalog = EntityCatalog::from_types(types)?;
        catalog.name = self.name;
        Ok(catalog)
    }
}

impl EntityCatalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        EntityCatalogConfig::from_yaml_str(yaml)?.into_catalog()
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        EntityCatalogConfig::from_yaml_file(path)?.into_catalog()
    }
}
