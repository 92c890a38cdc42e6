use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use clickfold::config;
use clickfold::entity_catalog::EntityCatalog;
use clickfold::materializer::{
    distinct_by_key_hook, root_collection_field, Query, Reconstructor, SplitOn,
};
use clickfold::row_source::memory::CannedResult;
use clickfold::row_source::{ClickHouseRowSource, MemoryRowSource, RowSource};
use serde_json::Value;

/// ClickFold - Reconstruct nested entities from flat ClickHouse rows
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Entity catalog YAML file
    #[arg(long)]
    catalog: PathBuf,

    /// Root entity type
    #[arg(long)]
    root: String,

    /// Root key field
    #[arg(long)]
    key: String,

    /// Child field path to populate (repeatable), e.g. Parent.Children
    #[arg(long = "field")]
    fields: Vec<String>,

    /// SQL text producing the joined rows
    #[arg(long)]
    sql: String,

    /// Query parameter as name=json (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Comma-separated split columns, one per child field
    #[arg(long)]
    split_on: Option<String>,

    /// Deduplicate a root collection as Field:KeyField or Root.Field:KeyField (repeatable)
    #[arg(long = "distinct")]
    distinct: Vec<String>,

    /// Read JSONCompactEachRowWithNames rows from a file instead of ClickHouse
    #[arg(long)]
    input: Option<PathBuf>,

    /// Folder configuration YAML file (replaces the environment and the flags below)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Null child values never overwrite already-set fields
    #[arg(long)]
    keep_existing_on_null: bool,

    /// Run multi-source statements one by one
    #[arg(long)]
    no_batch: bool,

    /// Fail on result columns that map to no field
    #[arg(long)]
    strict_columns: bool,

    /// Split column for types without a declared key [env: CLICKFOLD_DEFAULT_SPLIT_ON, default: Id]
    #[arg(long)]
    default_split_on: Option<String>,

    /// ClickHouse max_execution_time in seconds [env: CLICKFOLD_MAX_EXECUTION_TIME, default: 30]
    #[arg(long = "max-execution-time")]
    max_execution_time: Option<u32>,
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            keep_existing_on_null: cli.keep_existing_on_null,
            no_batch: cli.no_batch,
            strict_columns: cli.strict_columns,
            default_split_on: cli.default_split_on.clone(),
            max_execution_time_secs: cli.max_execution_time,
        }
    }
}

/// `name=value`; values that are not valid JSON are taken as strings
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{}`", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::FolderConfig::from_yaml_file(path),
        None => config::FolderConfig::from_cli((&cli).into()),
    }
    .context("Configuration error")?;

    let catalog = EntityCatalog::from_yaml_file(&cli.catalog)
        .with_context(|| format!("Failed to load catalog {}", cli.catalog.display()))?;

    let field_paths: Vec<&str> = cli.fields.iter().map(String::as_str).collect();
    let reconstructor = Reconstructor::new(Arc::new(catalog), &cli.root, &cli.key, &field_paths)?
        .with_config(config.clone());

    let mut query = Query::new(cli.sql.clone());
    for (name, value) in &cli.params {
        query = query.param(name.clone(), value.clone());
    }
    if let Some(split_on) = &cli.split_on {
        query = query.split_on(SplitOn::parse_list(split_on));
    }
    for entry in &cli.distinct {
        let (field, key_field) = entry
            .split_once(':')
            .ok_or_else(|| anyhow!("--distinct expects Field:KeyField, got `{}`", entry))?;
        let field = root_collection_field(reconstructor.catalog(), &cli.root, field)?;
        query = query.post_process(distinct_by_key_hook(field, key_field));
    }

    let source: Box<dyn RowSource> = match &cli.input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let canned = CannedResult::from_compact_json(&text)?;
            Box::new(MemoryRowSource::new().with_result(&cli.sql, canned))
        }
        None => {
            let source = ClickHouseRowSource::from_env().ok_or_else(|| {
                anyhow!("CLICKHOUSE_URL, CLICKHOUSE_USER, CLICKHOUSE_PASSWORD and CLICKHOUSE_DATABASE must be set")
            })?;
            Box::new(source.with_max_execution_time(config.max_execution_time_secs))
        }
    };

    let (roots, stats) = reconstructor
        .execute_with_stats(source.as_ref(), query)
        .await?;

    log::info!(
        "Reconstructed {} `{}` roots from {} rows",
        stats.roots,
        cli.root,
        stats.rows
    );
    if stats.skipped_attachments > 0 {
        log::info!("Skipped {} nested attachments", stats.skipped_attachments);
    }

    println!("{}", serde_json::to_string_pretty(&roots)?);
    Ok(())
}
