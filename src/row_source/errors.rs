use thiserror::Error;

use super::parameter_substitution::ParameterSubstitutionError;

/// Errors raised by row sources. These pass through the materializer unmodified.
#[derive(Debug, Error)]
pub enum RowSourceError {
    #[error("ClickHouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    #[error("I/O error while reading result rows: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parameter substitution error: {0}")]
    Parameter(#[from] ParameterSubstitutionError),

    #[error("Malformed result row: {0}")]
    MalformedRow(String),

    #[error("No result registered for query: {0}")]
    UnknownQuery(String),

    #[error("Result set {index} missing from batch of {expected} statements")]
    MissingResultSet { index: usize, expected: usize },

    #[error("Operation not supported by this row source: {0}")]
    Unsupported(String),
}
