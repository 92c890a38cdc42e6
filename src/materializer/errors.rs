//! # Materializer Error Types
//!
//! - **Configuration errors** (`InvalidFieldPath`, `MissingParameterName`,
//!   `ChildIndexOutOfRange`) surface at the call that configured the reconstructor.
//! - **Row-time errors** (`KeyExtractionError`, `TypeMismatch`, `SplitBoundary`) abort
//!   the fold in progress; the per-call identity table is dropped.
//! - Catalog and row-source errors pass through unmodified.
//!
//! A parent that is not found is not an error: it is an empty result.

use thiserror::Error;

use crate::entity_catalog::CatalogError;
use crate::row_source::RowSourceError;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Invalid field path `{path}`: {reason}")]
    InvalidFieldPath { path: String, reason: String },

    #[error("Cannot extract key `{key}` from `{entity}`: {reason}")]
    KeyExtractionError {
        entity: String,
        key: String,
        reason: String,
    },

    #[error("Type mismatch at {context}: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("Invalid split boundary: {0}")]
    SplitBoundary(String),

    #[error("Child index {index} out of range: {configured} child queries configured")]
    ChildIndexOutOfRange { index: usize, configured: usize },

    #[error("Cannot derive a parameter name for `{sql}`: add a $name placeholder or pass one explicitly")]
    MissingParameterName { sql: String },

    #[error("Post-processing failed: {0}")]
    PostProcess(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    RowSource(#[from] RowSourceError),
}

impl MaterializeError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        MaterializeError::InvalidFieldPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        MaterializeError::TypeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}
