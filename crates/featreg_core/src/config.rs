//! Registry process configuration.
//!
//! # Responsibility
//! - Load JSON configuration for storage, apply retries and logging.
//! - Validate values before anything is opened or initialized.
//!
//! # Invariants
//! - `max_apply_retries` is the total compare-and-swap attempt budget per
//!   apply and stays within `1..=MAX_APPLY_RETRIES_LIMIT`.
//! - A missing `database_path` means an in-memory database.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::logging::default_log_level;
use crate::service::DEFAULT_MAX_APPLY_ATTEMPTS;
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Upper bound accepted for `max_apply_retries`.
pub const MAX_APPLY_RETRIES_LIMIT: u32 = 10;

/// Logging section of the registry config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level_string")]
    pub level: String,
    /// Absolute directory for rotated log files; stderr when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level_string(),
            log_dir: None,
        }
    }
}

fn default_level_string() -> String {
    default_log_level().to_string()
}

/// Top-level registry config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_max_apply_retries")]
    pub max_apply_retries: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_apply_retries: DEFAULT_MAX_APPLY_ATTEMPTS,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_max_apply_retries() -> u32 {
    DEFAULT_MAX_APPLY_ATTEMPTS
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
    Db(DbError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl RegistryConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_APPLY_RETRIES_LIMIT).contains(&self.max_apply_retries) {
            return Err(ConfigError::Invalid(format!(
                "max_apply_retries must be within 1..={MAX_APPLY_RETRIES_LIMIT}, got {}",
                self.max_apply_retries
            )));
        }
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "database_path cannot be empty".to_string(),
                ));
            }
        }
        if let Some(dir) = &self.logging.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Opens the configured database, migrated and ready for repositories.
    pub fn open_database(&self) -> Result<Connection, ConfigError> {
        let conn = match &self.database_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Ok(conn)
    }
}
