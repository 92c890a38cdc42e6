//! Tabular row sources consumed by the materializer.
//!
//! A row source executes SQL text with a set of named parameters and yields a lazy,
//! single-pass sequence of flat column rows. Sources that can multiplex several
//! statements in one round trip also expose an ordered sequence of result sets.
//!
//! - [`ClickHouseRowSource`]: HTTP interface, `JSONCompactEachRowWithNames` streaming
//! - [`MemoryRowSource`]: canned result sets, used by tests and offline CLI runs

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

pub mod clickhouse_client;
pub mod errors;
pub mod memory;
pub mod parameter_substitution;
pub mod statement_batch;

pub use clickhouse_client::ClickHouseRowSource;
pub use errors::RowSourceError;
pub use memory::MemoryRowSource;
pub use parameter_substitution::{first_parameter_name, substitute_parameters};

/// Ordered mapping from parameter name to bound value
pub type QueryParams = IndexMap<String, Value>;

/// Single-pass cursor over the rows of one result set
#[async_trait]
pub trait RowCursor: Send {
    /// Result column names, in column order. Duplicates are allowed.
    fn columns(&self) -> &[String];

    /// Next row, one value per column, or `None` once the result set is exhausted
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, RowSourceError>;
}

/// Ordered result sets of a multi-statement batch, consumed one at a time
#[async_trait]
pub trait ResultSets: Send {
    async fn next_result(&mut self) -> Result<Option<Box<dyn RowCursor>>, RowSourceError>;
}

#[async_trait]
pub trait RowSource: Send + Sync {
    /// Execute one statement and return a cursor over its rows
    async fn query(
        &self,
        sql: &str,
        params: &QueryParams,
    ) -> Result<Box<dyn RowCursor>, RowSourceError>;

    /// Whether [`RowSource::query_multiple`] can run a `;`-joined batch in one round trip
    fn supports_multiple_results(&self) -> bool {
        false
    }

    /// Execute a `;`-joined batch with one shared parameter set
    async fn query_multiple(
        &self,
        _batch: &str,
        _params: &QueryParams,
    ) -> Result<Box<dyn ResultSets>, RowSourceError> {
        Err(RowSourceError::Unsupported(
            "multiple result sets per round trip".to_string(),
        ))
    }
}
