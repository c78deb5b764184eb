//! Runtime configuration resolved from environment variables.
//!
//! # Responsibility
//! - Decide where the database lives and how logging is set up.
//!
//! # Invariants
//! - Variables share the `CAREBOOK_` prefix; a `.env` file is honored by
//!   `from_env`.
//! - Values are validated here; consumers receive normalized settings.

use crate::logging::{default_log_level, normalize_level};
use ::config::{Config, Environment, Map};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "CAREBOOK";
pub const ENV_DB_PATH: &str = "CAREBOOK_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CAREBOOK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CAREBOOK_LOG_DIR";

const IN_MEMORY_MARKER: &str = ":memory:";

/// Where the SQLite database is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

/// Core runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub database: DatabaseLocation,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: &'static str,
    /// File logging is enabled only when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

/// Raw values as read from the environment, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    db_path: Option<String>,
    log_level: Option<String>,
    log_dir: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    /// The configuration source could not be read or deserialized.
    Load(::config::ConfigError),
    InvalidValue {
        variable: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(err) => write!(f, "failed to load configuration: {err}"),
            Self::InvalidValue { variable, message } => {
                write!(f, "invalid value for {variable}: {message}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<::config::ConfigError> for ConfigError {
    fn from(value: ::config::ConfigError) -> Self {
        Self::Load(value)
    }
}

impl CoreConfig {
    /// Resolves settings from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Resolves settings from an explicit variable map instead of the
    /// process environment. Keys are full names such as `CAREBOOK_DB_PATH`.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(map)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let raw: RawSettings = Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        Self::from_raw(raw)
    }

    // Blank values count as unset.
    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let present = |value: Option<String>| {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database = match present(raw.db_path) {
            None => DatabaseLocation::Memory,
            Some(value) if value == IN_MEMORY_MARKER => DatabaseLocation::Memory,
            Some(value) => DatabaseLocation::File(PathBuf::from(value)),
        };

        let log_level = match present(raw.log_level) {
            None => default_log_level(),
            Some(value) => normalize_level(&value).map_err(|err| ConfigError::InvalidValue {
                variable: ENV_LOG_LEVEL,
                message: err.to_string(),
            })?,
        };

        let log_dir = match present(raw.log_dir) {
            None => None,
            Some(value) if Path::new(&value).is_absolute() => Some(PathBuf::from(value)),
            Some(value) => {
                return Err(ConfigError::InvalidValue {
                    variable: ENV_LOG_DIR,
                    message: format!("must be an absolute path, got `{value}`"),
                })
            }
        };

        Ok(Self {
            database,
            log_level,
            log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DatabaseLocation, ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL};
    use std::path::PathBuf;

    fn resolve(pairs: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        CoreConfig::from_vars(pairs.iter().copied())
    }

    #[test]
    fn unset_and_memory_marker_mean_in_memory() {
        assert_eq!(resolve(&[]).unwrap(), CoreConfig::default());
        assert_eq!(
            resolve(&[(ENV_DB_PATH, ":memory:")]).unwrap().database,
            DatabaseLocation::Memory
        );
        assert_eq!(
            resolve(&[(ENV_DB_PATH, "/var/lib/carebook.db")])
                .unwrap()
                .database,
            DatabaseLocation::File(PathBuf::from("/var/lib/carebook.db"))
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = resolve(&[(ENV_DB_PATH, "   "), (ENV_LOG_DIR, "")]).unwrap();
        assert_eq!(config.database, DatabaseLocation::Memory);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn log_level_is_normalized_and_validated() {
        assert_eq!(
            resolve(&[(ENV_LOG_LEVEL, " WARNING ")]).unwrap().log_level,
            "warn"
        );
        assert!(matches!(
            resolve(&[(ENV_LOG_LEVEL, "loud")]),
            Err(ConfigError::InvalidValue {
                variable: ENV_LOG_LEVEL,
                ..
            })
        ));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let err = resolve(&[(ENV_LOG_DIR, "logs")]).unwrap_err();
        assert!(err.to_string().contains(ENV_LOG_DIR));
    }

    #[test]
    fn absolute_log_dir_is_kept() {
        let config = resolve(&[(ENV_LOG_DIR, "/var/log/carebook")]).unwrap();
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/carebook")));
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let config = resolve(&[
            ("OTHER_DB_PATH", "/tmp/other.db"),
            ("CAREBOOK_THEME", "dark"),
        ])
        .unwrap();
        assert_eq!(config.database, DatabaseLocation::Memory);
    }
}
