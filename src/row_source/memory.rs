//! In-memory row source with canned result sets.
//!
//! Results are registered against SQL templates (whitespace-normalized, placeholders
//! left in). A query first looks for a result registered under its substituted text,
//! then under its template, so tests can serve different rows per bound key.
//! Every round trip is recorded so callers can assert how many statements ran.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::clickhouse_client::{parse_header, parse_row};
use super::parameter_substitution::substitute_parameters;
use super::statement_batch::{normalize_sql, split_statements};
use super::{QueryParams, ResultSets, RowCursor, RowSource, RowSourceError};

/// A canned result set: column names and rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CannedResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl CannedResult {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Vec<Value>>) -> Self {
        CannedResult {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Parse `JSONCompactEachRowWithNames` text: a header array, then one array per row
    pub fn from_compact_json(text: &str) -> Result<Self, RowSourceError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let columns = match lines.next() {
            Some(header) => parse_header(header)?,
            None => return Ok(CannedResult::default()),
        };
        let rows = lines
            .map(|line| parse_row(line, columns.len()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CannedResult { columns, rows })
    }
}

#[derive(Debug, Default)]
pub struct MemoryRowSource {
    results: HashMap<String, CannedResult>,
    round_trips: Mutex<Vec<Vec<String>>>,
}

impl MemoryRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the result for a SQL template (or fully substituted SQL)
    pub fn with_result(mut self, sql: &str, result: CannedResult) -> Self {
        self.add_result(sql, result);
        self
    }

    pub fn add_result(&mut self, sql: &str, result: CannedResult) {
        self.results.insert(normalize_sql(sql), result);
    }

    /// Statements executed per round trip, in execution order
    pub fn round_trips(&self) -> Vec<Vec<String>> {
        self.round_trips
            .lock()
            .map(|trips| trips.clone())
            .unwrap_or_default()
    }

    /// Total number of statements executed across all round trips
    pub fn statement_count(&self) -> usize {
        self.round_trips().iter().map(Vec::len).sum()
    }

    fn record(&self, statements: Vec<String>) {
        if let Ok(mut trips) = self.round_trips.lock() {
            trips.push(statements);
        }
    }

    fn lookup(&self, sql: &str, params: &QueryParams) -> Result<MemoryCursor, RowSourceError> {
        let substituted = normalize_sql(&substitute_parameters(sql, params)?);
        let template = normalize_sql(sql);

        let result = self
            .results
            .get(&substituted)
            .or_else(|| self.results.get(&template))
            .ok_or(RowSourceError::UnknownQuery(substituted))?;

        Ok(MemoryCursor {
            columns: result.columns.clone(),
            rows: result.rows.clone().into(),
        })
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn query(
        &self,
        sql: &str,
        params: &QueryParams,
    ) -> Result<Box<dyn RowCursor>, RowSourceError> {
        self.record(vec![normalize_sql(sql)]);
        Ok(Box::new(self.lookup(sql, params)?))
    }

    fn supports_multiple_results(&self) -> bool {
        true
    }

    async fn query_multiple(
        &self,
        batch: &str,
        params: &QueryParams,
    ) -> Result<Box<dyn ResultSets>, RowSourceError> {
        let statements = split_statements(batch);
        self.record(statements.iter().map(|s| normalize_sql(s)).collect());

        let cursors = statements
            .iter()
            .map(|sql| self.lookup(sql, params))
            .collect::<Result<VecDeque<_>, _>>()?;
        Ok(Box::new(MemoryResultSets { cursors }))
    }
}

#[derive(Debug)]
pub struct MemoryCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
}

#[async_trait]
impl RowCursor for MemoryCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, RowSourceError> {
        Ok(self.rows.pop_front())
    }
}

struct MemoryResultSets {
    cursors: VecDeque<MemoryCursor>,
}

#[async_trait]
impl ResultSets for MemoryResultSets {
    async fn next_result(&mut self) -> Result<Option<Box<dyn RowCursor>>, RowSourceError> {
        Ok(self
            .cursors
            .pop_front()
            .map(|c| Box::new(c) as Box<dyn RowCursor>))
    }
}
