//! Configuration management for panverify.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Command-line flags are layered on top by
//! the binary.

use crate::error::{ConfigError, ConfigResult};
use crate::retry::RetryPolicy;
use crate::types::{SelectionMode, SortOrder, UpdateScope};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// Loaded from an explicit path, or `~/.config/panverify/config.toml` (or
/// platform equivalent). Missing files fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Connection parameters for the record store
    pub database: DatabaseConfig,
    /// Target table and its column mapping
    pub table: TableConfig,
    /// Candidate selection strategy
    pub selection: SelectionConfig,
    /// External verification service
    pub service: ServiceConfig,
    /// Pacing and reporting of the run loop
    pub pipeline: PipelineSettings,
}

impl AppConfig {
    /// Load configuration, falling back to defaults if no file is found.
    ///
    /// An explicit `path` must exist; the default location may be absent.
    ///
    /// # Errors
    /// Returns error if:
    /// - An explicit path does not exist
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let config_path = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                explicit.to_path_buf()
            }
            None => Self::config_path()?,
        };

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration and apply environment variable overrides.
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_from(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Supports the following variables:
    /// - `PANVERIFY_DATABASE_URL`: record store URL
    /// - `PANVERIFY_DATABASE_KEY`: SQLCipher key (hex)
    /// - `PANVERIFY_TABLE`: target table name
    /// - `PANVERIFY_BATCH_LIMIT`: records per selection
    /// - `PANVERIFY_SERVICE_URL`: verification endpoint
    /// - `PANVERIFY_MIN_INTERVAL_SECS`: rate limiter interval
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PANVERIFY_DATABASE_URL") {
            tracing::debug!("Override database.url from env");
            self.database.url = url;
        }

        if let Some(key) = lookup("PANVERIFY_DATABASE_KEY") {
            tracing::debug!("Override database.encryption_key from env");
            self.database.encryption_key = Some(key);
        }

        if let Some(table) = lookup("PANVERIFY_TABLE") {
            tracing::debug!("Override table.name from env: {}", table);
            self.table.name = table;
        }

        if let Some(val) = lookup("PANVERIFY_BATCH_LIMIT") {
            self.selection.batch_limit = val.parse().map_err(|_| {
                ConfigError::invalid("PANVERIFY_BATCH_LIMIT", format!("not a number: '{val}'"))
            })?;
            tracing::debug!(
                "Override selection.batch_limit from env: {}",
                self.selection.batch_limit
            );
        }

        if let Some(url) = lookup("PANVERIFY_SERVICE_URL") {
            tracing::debug!("Override service.url from env: {}", url);
            self.service.url = url;
        }

        if let Some(val) = lookup("PANVERIFY_MIN_INTERVAL_SECS") {
            self.pipeline.min_call_interval_secs = val.parse().map_err(|_| {
                ConfigError::invalid(
                    "PANVERIFY_MIN_INTERVAL_SECS",
                    format!("not a number: '{val}'"),
                )
            })?;
        }

        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::invalid("database.url", "must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be greater than zero",
            ));
        }
        if self.table.name.trim().is_empty() {
            return Err(ConfigError::invalid("table.name", "must not be empty"));
        }
        self.table.columns.validate()?;
        if let Some(field) = &self.selection.ordering_field {
            if field.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "selection.ordering_field",
                    "must not be empty when set",
                ));
            }
        }
        if self.selection.batch_limit == 0 {
            return Err(ConfigError::invalid(
                "selection.batch_limit",
                "must be greater than zero",
            ));
        }
        if self.service.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "service.max_attempts",
                "must be greater than zero",
            ));
        }
        if self.service.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "service.timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.pipeline.max_connect_attempts == Some(0) {
            return Err(ConfigError::invalid(
                "pipeline.max_connect_attempts",
                "must be greater than zero when set",
            ));
        }
        if self.pipeline.max_write_failures == 0 {
            return Err(ConfigError::invalid(
                "pipeline.max_write_failures",
                "must be greater than zero",
            ));
        }
        if self.pipeline.report_every == 0 {
            return Err(ConfigError::invalid(
                "pipeline.report_every",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Get the path to the default configuration file.
    ///
    /// Uses XDG base directories: `~/.config/panverify/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "panverify", "panverify").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Render the configuration as TOML (the encryption key is never written).
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Record store connection parameters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlx` connection URL, e.g. `sqlite://tds.db`
    pub url: String,
    /// Pool size; the pipeline itself only ever holds one connection
    pub max_connections: u32,
    /// How long to wait for a connection before reporting a connectivity error
    pub acquire_timeout_secs: u64,
    /// Optional SQLCipher key (hex). Never serialized.
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
}

impl DatabaseConfig {
    /// Acquire timeout as a `Duration`.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://panverify.db".to_string(),
            max_connections: 2,
            acquire_timeout_secs: 30,
            encryption_key: None,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Target table and column mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table holding the records
    pub name: String,
    /// Physical column names for each record attribute
    pub columns: ColumnMap,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "tds_data".to_string(),
            columns: ColumnMap::default(),
        }
    }
}

/// Physical column names for the record attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    /// Unique key column (`rowid` works for any SQLite rowid table)
    pub key: String,
    /// PAN column
    pub identifier: String,
    /// Optional ordering metric column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Validity flag column (INTEGER 1/0/NULL)
    pub valid: String,
    /// Outcome message column; NULL marks a record as unprocessed
    pub message: String,
    /// Last attempt timestamp column
    pub checked_at: String,
}

impl ColumnMap {
    /// Columns that must exist in the table (excluding implicit `rowid`).
    #[must_use]
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns = vec![
            self.identifier.as_str(),
            self.valid.as_str(),
            self.message.as_str(),
            self.checked_at.as_str(),
        ];
        if !is_implicit_rowid(&self.key) {
            columns.insert(0, self.key.as_str());
        }
        if let Some(priority) = &self.priority {
            columns.push(priority.as_str());
        }
        columns
    }

    fn validate(&self) -> ConfigResult<()> {
        let named = [
            ("table.columns.key", &self.key),
            ("table.columns.identifier", &self.identifier),
            ("table.columns.valid", &self.valid),
            ("table.columns.message", &self.message),
            ("table.columns.checked_at", &self.checked_at),
        ];
        for (field, value) in named {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }
        if matches!(&self.priority, Some(p) if p.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "table.columns.priority",
                "must not be empty when set",
            ));
        }
        Ok(())
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            key: "rowid".to_string(),
            identifier: "pan".to_string(),
            priority: Some("total_tds".to_string()),
            valid: "pan_valid".to_string(),
            message: "pan_msg".to_string(),
            checked_at: "last_checked".to_string(),
        }
    }
}

/// Whether `column` names SQLite's implicit row id.
#[must_use]
pub fn is_implicit_rowid(column: &str) -> bool {
    matches!(
        column.to_ascii_lowercase().as_str(),
        "rowid" | "_rowid_" | "oid"
    )
}

/// Candidate selection strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Single-record or batch selection
    pub mode: SelectionMode,
    /// Maximum records per selection in batch mode
    pub batch_limit: u32,
    /// Rows skipped by the first selection of a run
    pub batch_offset: u32,
    /// Ordering column; defaults to the priority column, then the identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_field: Option<String>,
    /// Ordering direction
    pub order: SortOrder,
    /// Rows an outcome is written to
    pub update_scope: UpdateScope,
}

impl SelectionConfig {
    /// Resolve the column candidates are ordered by.
    #[must_use]
    pub fn ordering_column<'a>(&'a self, columns: &'a ColumnMap) -> &'a str {
        self.ordering_field
            .as_deref()
            .or(columns.priority.as_deref())
            .unwrap_or(columns.identifier.as_str())
    }

    /// Records selected per unit of work.
    #[must_use]
    pub fn selection_limit(&self) -> u32 {
        match self.mode {
            SelectionMode::Single => 1,
            SelectionMode::Batch => self.batch_limit,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Single,
            batch_limit: 1000,
            batch_offset: 0,
            ordering_field: None,
            order: SortOrder::Desc,
            update_scope: UpdateScope::Key,
        }
    }
}

/// External verification service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Endpoint receiving the POST request
    pub url: String,
    /// Value of `serviceName` in the body and of the `sn` header
    pub service_name: String,
    /// User agent string
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Total attempts per identifier
    pub max_attempts: u32,
    /// Delay between attempts in seconds
    pub retry_delay_secs: u64,
    /// Status value meaning "no error"
    pub valid_status: String,
}

impl ServiceConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay between attempts as a `Duration`.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: "https://eportal.incometax.gov.in/iec/registrationapi/saveEntity".to_string(),
            service_name: "checkPanDetailsService".to_string(),
            user_agent:
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:138.0) Gecko/20100101 Firefox/138.0"
                    .to_string(),
            timeout_secs: 15,
            max_attempts: 3,
            retry_delay_secs: 5,
            valid_status: "\u{0}".to_string(),
        }
    }
}

/// Pacing and reporting of the run loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Minimum seconds between two verification calls
    pub min_call_interval_secs: u64,
    /// Seconds to wait after a failed connection attempt
    pub connect_cooldown_secs: u64,
    /// Give up after this many failed connection attempts; unset retries forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connect_attempts: Option<u32>,
    /// Emit a progress line every N processed records
    pub report_every: u64,
    /// Stop the run once this many records failed to persist
    pub max_write_failures: u32,
}

impl PipelineSettings {
    /// Rate limiter interval as a `Duration`.
    #[must_use]
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_secs(self.min_call_interval_secs)
    }

    /// Connection cooldown as a `Duration`.
    #[must_use]
    pub fn connect_cooldown(&self) -> Duration {
        Duration::from_secs(self.connect_cooldown_secs)
    }

    /// Retry policy for acquiring a connection and selecting candidates.
    #[must_use]
    pub fn reconnect_policy(&self) -> RetryPolicy {
        match self.max_connect_attempts {
            Some(max) => RetryPolicy::bounded(max, self.connect_cooldown()),
            None => RetryPolicy::unbounded(self.connect_cooldown()),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_call_interval_secs: 5,
            connect_cooldown_secs: 60,
            max_connect_attempts: None,
            report_every: 10,
            max_write_failures: 1000,
        }
    }
}
