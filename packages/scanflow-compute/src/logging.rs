//! Logging setup
//!
//! `RUST_LOG`, when set and valid, takes precedence over the configured
//! level. Otherwise the configured level applies to everything except
//! noisy dependencies, which stay at `warn` unless tracing.

use crate::config::{ConfigError, ConfigResult, LoggingConfig};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Targets pinned to `warn` below `trace`
pub const NOISY_TARGETS: &[&str] = &["rusqlite", "hyper"];

/// Parse a level name, case-insensitive
pub fn parse_level(level: &str) -> ConfigResult<Level> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ConfigError::UnknownLogLevel(level.to_string())),
    }
}

/// Filter directives for a root level
pub fn filter_directives(level: Level) -> String {
    let root = level.to_string().to_ascii_lowercase();
    if level == Level::TRACE {
        return root;
    }
    let mut directives = vec![root];
    directives.extend(NOISY_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}

pub fn build_filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    let level = parse_level(&config.level)?;
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    Ok(EnvFilter::new(filter_directives(level)))
}

/// Install the global subscriber. Later calls keep the first subscriber.
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = build_filter(config)?;
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_case_insensitive() {
        assert_eq!(parse_level("INFO").unwrap(), Level::INFO);
        assert_eq!(parse_level("Warn").unwrap(), Level::WARN);
        assert!(matches!(
            parse_level("verbose"),
            Err(ConfigError::UnknownLogLevel(_))
        ));
    }

    #[test]
    fn test_noisy_targets_pinned_below_trace() {
        assert_eq!(filter_directives(Level::INFO), "info,rusqlite=warn,hyper=warn");
        assert_eq!(filter_directives(Level::DEBUG), "debug,rusqlite=warn,hyper=warn");
        assert_eq!(filter_directives(Level::TRACE), "trace");
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_invalid_level_rejected_before_install() {
        let config = LoggingConfig {
            level: "loud".to_string(),
        };
        assert!(init_logging(&config).is_err());
    }
}
