//! Runtime configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Parse a JSON config document with per-field defaults.
//! - Build the store, retry policy and logger the services run with.
//!
//! # Invariants
//! - A missing field takes its default; unknown fields are rejected.
//! - `retry.max_attempts` is at least 1 after validation.

use crate::logging::{self, LoggingError};
use crate::service::retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use crate::store::{SqliteStore, StoreResult};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file; `None` keeps all data in memory.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` leaves logging to the host.
    pub log_dir: Option<PathBuf>,
    pub retry: RetryPolicyConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: logging::default_log_level().to_string(),
            log_dir: None,
            retry: RetryPolicyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub retry_unknown_outcome: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF.as_millis() as u64,
            retry_unknown_outcome: false,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl CoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        logging::normalize_level(&self.log_level)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry.max_attempts)
            .with_backoff(Duration::from_millis(self.retry.backoff_ms))
            .with_retry_unknown_outcome(self.retry.retry_unknown_outcome)
    }

    /// Opens the configured store, file-backed when `db_path` is set.
    pub fn open_store(&self) -> StoreResult<SqliteStore> {
        match &self.db_path {
            Some(path) => SqliteStore::open(path),
            None => SqliteStore::open_in_memory(),
        }
    }

    /// Starts file logging when `log_dir` is set.
    ///
    /// Returns whether a logger was configured.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        match &self.log_dir {
            Some(dir) => logging::init_logging(&self.log_level, dir).map(|()| true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(100));
        assert!(!policy.retry_unknown_outcome);
    }

    #[test]
    fn partial_retry_section_keeps_other_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"retry": {"max_attempts": 5}, "log_level": "warn"}"#)
                .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_ms, 100);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn rejects_zero_attempts_and_bad_level() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"retry": {"max_attempts": 0}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"log_dir": "relative/logs"}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"db": "x"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn from_file_reads_document_and_opens_store() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("core.json");
        let db_path = dir.path().join("core.sqlite3");
        let raw = serde_json::json!({ "db_path": db_path }).to_string();
        std::fs::write(&config_path, raw).unwrap();

        let config = CoreConfig::from_file(&config_path).unwrap();
        assert_eq!(config.db_path.as_deref(), Some(db_path.as_path()));

        let store = config.open_store().unwrap();
        assert_eq!(store.row_count("demo", "users").unwrap(), 0);
        assert!(db_path.exists());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = CoreConfig::from_file("/nonexistent/core.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/core.json"));
    }

    #[test]
    fn logging_is_skipped_without_log_dir() {
        assert!(!CoreConfig::default().init_logging().unwrap());
    }
}
