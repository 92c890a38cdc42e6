use std::env;

use async_trait::async_trait;
use clickhouse::Client;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::parameter_substitution::substitute_parameters;
use super::{QueryParams, RowCursor, RowSource, RowSourceError};

/// Output format that carries a header line with column names. Unlike JSONEachRow,
/// duplicate column names from joined tables survive.
const RESULT_FORMAT: &str = "JSONCompactEachRowWithNames";

fn read_env_var(key: &str) -> Option<String> {
    env::var(key).ok()
}

pub fn try_get_client() -> Option<Client> {
    let url = read_env_var("CLICKHOUSE_URL")?;
    let user = read_env_var("CLICKHOUSE_USER")?;
    let password = read_env_var("CLICKHOUSE_PASSWORD")?;
    let database = read_env_var("CLICKHOUSE_DATABASE")?;

    log::debug!("Connecting to ClickHouse at {}", url);
    Some(
        Client::default()
            .with_url(url)
            .with_user(user)
            .with_password(password)
            .with_database(database)
            .with_option("join_use_nulls", "1") // Return NULL for unmatched LEFT JOIN columns
            .with_option("output_format_json_quote_64bit_integers", "0"),
    )
}

/// Row source backed by the ClickHouse HTTP interface.
///
/// ClickHouse runs one statement per HTTP request, so this source does not multiplex
/// result sets; multi-source reconstruction falls back to sequential queries.
#[derive(Clone)]
pub struct ClickHouseRowSource {
    client: Client,
}

impl ClickHouseRowSource {
    pub fn new(client: Client) -> Self {
        ClickHouseRowSource { client }
    }

    /// Build from `CLICKHOUSE_URL`, `CLICKHOUSE_USER`, `CLICKHOUSE_PASSWORD` and
    /// `CLICKHOUSE_DATABASE`. Returns `None` if any is unset.
    pub fn from_env() -> Option<Self> {
        try_get_client().map(Self::new)
    }

    /// Abort queries server-side after `secs` seconds
    pub fn with_max_execution_time(self, secs: u32) -> Self {
        ClickHouseRowSource {
            client: self
                .client
                .with_option("max_execution_time", secs.to_string()),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl RowSource for ClickHouseRowSource {
    async fn query(
        &self,
        sql: &str,
        params: &QueryParams,
    ) -> Result<Box<dyn RowCursor>, RowSourceError> {
        let final_sql = substitute_parameters(sql, params)?;
        log::debug!("Executing SQL:\n{}", final_sql);

        let reader = self
            .client
            .query(&final_sql)
            .fetch_bytes(RESULT_FORMAT)
            .map_err(|e| {
                // Log full SQL on error for debugging
                log::error!(
                    "ClickHouse query failed. SQL was:\n{}\nError: {}",
                    final_sql,
                    e
                );
                RowSourceError::from(e)
            })?;

        let cursor = LinesCursor::open(reader.lines()).await?;
        Ok(Box::new(cursor))
    }
}

/// Cursor over `JSONCompactEachRowWithNames` lines: a header array of column names,
/// then one JSON array per row.
pub(crate) struct LinesCursor<R> {
    columns: Vec<String>,
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LinesCursor<R> {
    pub(crate) async fn open(mut lines: Lines<R>) -> Result<Self, RowSourceError> {
        let columns = match next_non_empty_line(&mut lines).await? {
            Some(header) => parse_header(&header)?,
            // No header means no result columns at all
            None => Vec::new(),
        };
        Ok(LinesCursor { columns, lines })
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> RowCursor for LinesCursor<R> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, RowSourceError> {
        match next_non_empty_line(&mut self.lines).await? {
            Some(line) => parse_row(&line, self.columns.len()).map(Some),
            None => Ok(None),
        }
    }
}

async fn next_non_empty_line<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
) -> Result<Option<String>, RowSourceError> {
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

/// Parse the header line of a `JSONCompactEachRowWithNames` result
pub(crate) fn parse_header(line: &str) -> Result<Vec<String>, RowSourceError> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Array(names)) => names
            .into_iter()
            .map(|name| match name {
                Value::String(s) => Ok(s),
                other => Err(RowSourceError::MalformedRow(format!(
                    "column name is not a string: {}",
                    other
                ))),
            })
            .collect(),
        Ok(other) => Err(RowSourceError::MalformedRow(format!(
            "expected header array, got: {}",
            other
        ))),
        Err(e) => Err(RowSourceError::MalformedRow(format!(
            "invalid header JSON: {}",
            e
        ))),
    }
}

/// Parse one data line, checking it carries exactly `width` values
pub(crate) fn parse_row(line: &str, width: usize) -> Result<Vec<Value>, RowSourceError> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Array(values)) if values.len() == width => Ok(values),
        Ok(Value::Array(values)) => Err(RowSourceError::MalformedRow(format!(
            "expected {} values, got {}",
            width,
            values.len()
        ))),
        Ok(other) => {
            log::warn!("Unexpected JSON format in result row: {}", line);
            Err(RowSourceError::MalformedRow(format!(
                "expected row array, got: {}",
                other
            )))
        }
        Err(e) => Err(RowSourceError::MalformedRow(format!(
            "invalid row JSON: {}",
            e
        ))),
    }
}
