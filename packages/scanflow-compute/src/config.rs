//! Compute configuration
//!
//! Loaded from versioned YAML:
//!
//! ```yaml
//! version: 1
//! database:
//!   path: /var/lib/scanflow/scanflow.db
//! workers: 4
//! enrichers: [scm, duplication]
//! logging:
//!   level: info
//! ```
//!
//! Every section is optional except `version`.

use crate::enrichment::EnricherKind;
use scanflow_storage::SqliteRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];
pub const MAX_WORKERS: usize = 64;

/// In-memory database path
pub const MEMORY_DATABASE: &str = ":memory:";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("Invalid range for field '{field}': {value} not in {min}..={max}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Enricher '{0}' listed more than once")]
    DuplicateEnricher(EnricherKind),

    #[error("Unknown log level '{0}'. Valid levels: trace, debug, info, warn, error")]
    UnknownLogLevel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("scanflow.db"),
        }
    }
}

impl DatabaseConfig {
    pub fn open(&self) -> scanflow_storage::Result<SqliteRepository> {
        if self.path == Path::new(MEMORY_DATABASE) {
            SqliteRepository::in_memory()
        } else {
            SqliteRepository::open(&self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    version: Option<u32>,
    #[serde(default)]
    database: Option<DatabaseConfig>,
    #[serde(default)]
    workers: Option<usize>,
    #[serde(default)]
    enrichers: Option<Vec<EnricherKind>>,
    #[serde(default)]
    logging: Option<LoggingConfig>,
}

/// Validated compute configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputeConfig {
    pub database: DatabaseConfig,
    pub workers: usize,
    pub enrichers: Vec<EnricherKind>,
    pub logging: LoggingConfig,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            workers: default_workers(),
            enrichers: EnricherKind::default_order(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

impl ComputeConfig {
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let defaults = Self::default();
        let config = Self {
            database: file.database.unwrap_or(defaults.database),
            workers: file.workers.unwrap_or(defaults.workers),
            enrichers: file.enrichers.unwrap_or(defaults.enrichers),
            logging: file.logging.unwrap_or(defaults.logging),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::Range {
                field: "workers".to_string(),
                value: self.workers.to_string(),
                min: "1".to_string(),
                max: MAX_WORKERS.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for kind in &self.enrichers {
            if !seen.insert(*kind) {
                return Err(ConfigError::DuplicateEnricher(*kind));
            }
        }

        crate::logging::parse_level(&self.logging.level)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            database: Some(self.database.clone()),
            workers: Some(self.workers),
            enrichers: Some(self.enrichers.clone()),
            logging: Some(self.logging.clone()),
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}
