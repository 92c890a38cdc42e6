use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::materializer::NullPolicy;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Reconstruction configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    /// Whether a null child overwrites an already-set single-valued field
    pub null_policy: NullPolicy,

    /// Send all multi-source statements in one batch when the source can multiplex
    pub batch_child_queries: bool,

    /// Fail on result-set columns that map to no field instead of ignoring them
    pub strict_column_mapping: bool,

    /// Split column for types without a declared key
    #[validate(length(min = 1, message = "Default split column cannot be empty"))]
    pub default_split_on: String,

    /// ClickHouse `max_execution_time` in seconds (1-3600)
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Max execution time must be between 1 and 3600 seconds"
    ))]
    pub max_execution_time_secs: u32,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            null_policy: NullPolicy::LastWriteWins,
            batch_child_queries: true,
            strict_column_mapping: false,
            default_split_on: "Id".to_string(),
            max_execution_time_secs: 30,
        }
    }
}

impl FolderConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            null_policy: parse_env_var("CLICKFOLD_NULL_POLICY", "last_write_wins")?,
            batch_child_queries: parse_env_var("CLICKFOLD_BATCH_CHILD_QUERIES", "true")?,
            strict_column_mapping: parse_env_var("CLICKFOLD_STRICT_COLUMN_MAPPING", "false")?,
            default_split_on: env::var("CLICKFOLD_DEFAULT_SPLIT_ON")
                .unwrap_or_else(|_| "Id".to_string()),
            max_execution_time_secs: parse_env_var("CLICKFOLD_MAX_EXECUTION_TIME", "30")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments layered over the `CLICKFOLD_*` environment.
    ///
    /// Flags that were not given leave the environment (or default) value in place.
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        config.merge(cli);
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply explicitly given CLI flags over this configuration
    pub fn merge(&mut self, cli: CliConfig) {
        if cli.keep_existing_on_null {
            self.null_policy = NullPolicy::KeepExisting;
        }
        if cli.no_batch {
            self.batch_child_queries = false;
        }
        if cli.strict_columns {
            self.strict_column_mapping = true;
        }
        if let Some(split_on) = cli.default_split_on {
            self.default_split_on = split_on;
        }
        if let Some(secs) = cli.max_execution_time_secs {
            self.max_execution_time_secs = secs;
        }
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub keep_existing_on_null: bool,
    pub no_batch: bool,
    pub strict_columns: bool,
    pub default_split_on: Option<String>,
    pub max_execution_time_secs: Option<u32>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
