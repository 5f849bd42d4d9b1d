//! Configuration schema and loading.
//!
//! All settings come from a single TOML file with two tables: `preset`
//! (logging and page-store inputs) and `server.http` (listener and
//! connection parameters). Every field has a default, so a partial file is
//! fine; a missing file, a parse failure, an unknown `log_levels` entry or a
//! failed validation is fatal at startup.

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Errors raised while loading or validating configuration. All fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preset: Preset,
    pub server: ServerSection,
}

impl Config {
    /// Loads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let http = &self.server.http;

        if http.backlog > i32::MAX as u32 {
            return Err(ConfigError::Invalid(format!(
                "server.http.backlog {} does not fit a listen backlog",
                http.backlog
            )));
        }
        if http.keepalive <= 0 {
            return Err(ConfigError::Invalid(format!(
                "server.http.keepalive must be positive, got {}",
                http.keepalive
            )));
        }
        if self.preset.log_levels.is_empty() {
            return Err(ConfigError::Invalid(
                "preset.log_levels must enable at least one level".into(),
            ));
        }
        if self.preset.page_limit == 0 {
            return Err(ConfigError::Invalid(
                "preset.page_limit must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Log levels accepted in `preset.log_levels`. Anything else fails parsing,
/// which is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// The `preset` table: logging and page-store inputs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Preset {
    /// Forces DEBUG-level logging regardless of `log_levels`.
    pub debug: bool,

    /// Log destination file; console when absent.
    pub log_file: Option<PathBuf>,

    /// Enabled log levels. The most verbose enabled level wins.
    pub log_levels: Vec<LogLevel>,

    /// Directory the page store loads templates from.
    pub page_dir: PathBuf,

    /// Maximum number of templates loaded from `page_dir`.
    pub page_limit: usize,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            debug: false,
            log_file: None,
            log_levels: vec![
                LogLevel::Info,
                LogLevel::Warn,
                LogLevel::Error,
                LogLevel::Fatal,
            ],
            page_dir: PathBuf::from("pages"),
            page_limit: 32,
        }
    }
}

/// The `server` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub http: HttpConfig,
}

/// The `server.http` table: listener and connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listener bind address.
    pub ip_address: String,

    /// Listener bind port.
    pub port: u16,

    /// Listen backlog. Must fit an `i32`.
    pub backlog: u32,

    /// Per-connection idle timer, in seconds.
    pub keepalive: i64,

    /// TCP keep-alive probe count.
    pub keepalive_count: u32,

    /// Seconds of idleness before TCP keep-alive probing starts.
    pub keepalive_idle: u64,

    /// Seconds between TCP keep-alive probes.
    pub keepalive_interval: u64,

    /// When `true`, connections are recycled for further requests after a
    /// successful response instead of being terminated.
    pub reuse_connections: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            ip_address: "127.0.0.1".to_string(),
            port: 8080,
            backlog: 128,
            keepalive: 30,
            keepalive_count: 3,
            keepalive_idle: 60,
            keepalive_interval: 10,
            reuse_connections: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file() {
        let raw = r#"
            [preset]
            debug = true
            log_file = "/tmp/server.log"
            log_levels = ["DEBUG", "INFO", "WARN", "ERROR", "FATAL"]
            page_dir = "templates"
            page_limit = 8

            [server.http]
            ip_address = "0.0.0.0"
            port = 9000
            backlog = 256
            keepalive = 15
            keepalive_count = 5
            keepalive_idle = 120
            keepalive_interval = 20
            reuse_connections = true
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        config.validate().unwrap();

        assert!(config.preset.debug);
        assert_eq!(config.preset.log_file, Some(PathBuf::from("/tmp/server.log")));
        assert_eq!(config.preset.log_levels.len(), 5);
        assert_eq!(config.preset.page_dir, PathBuf::from("templates"));
        assert_eq!(config.preset.page_limit, 8);
        assert_eq!(config.server.http.ip_address, "0.0.0.0");
        assert_eq!(config.server.http.port, 9000);
        assert_eq!(config.server.http.backlog, 256);
        assert_eq!(config.server.http.keepalive, 15);
        assert!(config.server.http.reuse_connections);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        config.validate().unwrap();

        assert!(!config.preset.debug);
        assert_eq!(config.preset.log_file, None);
        assert_eq!(config.server.http.ip_address, "127.0.0.1");
        assert_eq!(config.server.http.port, 8080);
        assert_eq!(config.server.http.keepalive, 30);
        assert!(!config.server.http.reuse_connections);
    }

    #[test]
    fn unknown_log_level_is_an_error() {
        let raw = r#"
            [preset]
            log_levels = ["VERBOSE"]
        "#;

        assert!(toml::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn validation_failures() {
        let zero_keepalive = r#"
            [server.http]
            keepalive = 0
        "#;
        let config: Config = toml::from_str(zero_keepalive).unwrap();
        assert!(config.validate().is_err());

        let no_levels = r#"
            [preset]
            log_levels = []
        "#;
        let config: Config = toml::from_str(no_levels).unwrap();
        assert!(config.validate().is_err());

        let zero_pages = r#"
            [preset]
            page_limit = 0
        "#;
        let config: Config = toml::from_str(zero_pages).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_fatal() {
        let result = Config::load(Path::new("/nonexistent/lane_web/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
