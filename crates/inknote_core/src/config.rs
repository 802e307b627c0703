//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve store path, log settings and autosave cadence from `INKNOTE_*`
//!   variables with defaults for anything unset.
//!
//! # Invariants
//! - Blank values are treated as unset.
//! - Malformed values are rejected, never silently replaced by defaults.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "INKNOTE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "INKNOTE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "INKNOTE_LOG_DIR";
pub const ENV_AUTOSAVE_SECS: &str = "INKNOTE_AUTOSAVE_SECS";

const DB_FILE_NAME: &str = "inknote.sqlite3";
const DEFAULT_AUTOSAVE_SECS: u64 = 30;
const MIN_AUTOSAVE_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for {key}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Autosave cadence handed to the coordinator's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub autosave: AutosaveConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            autosave: AutosaveConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, defaulting anything it lacks.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.log_dir = read(ENV_LOG_DIR).map(PathBuf::from);
        if let Some(raw) = read(ENV_AUTOSAVE_SECS) {
            config.autosave = parse_autosave(&raw)?;
        }
        Ok(config)
    }
}

fn parse_autosave(raw: &str) -> Result<AutosaveConfig, ConfigError> {
    let secs = raw
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: ENV_AUTOSAVE_SECS,
            value: raw.to_string(),
        })?;
    if secs == 0 {
        return Ok(AutosaveConfig {
            enabled: false,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_SECS),
        });
    }
    Ok(AutosaveConfig {
        enabled: true,
        interval: Duration::from_secs(secs.max(MIN_AUTOSAVE_SECS)),
    })
}
