//! Daemon configuration.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - a TOML file (`--config PATH`, else `~/.config/linechat/config.toml` if present)
//! - the `LINECHAT_ADDR` environment variable
//! - the `--addr` command-line flag (applied by the binary)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::outbound::{DEFAULT_MAILBOX_CAPACITY, DEFAULT_WRITE_TIMEOUT};
use crate::registry::DEFAULT_EVENT_BUFFER;
use crate::server::ConnectionSettings;
use crate::session::DEFAULT_MAX_LINE_LENGTH;

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

/// Environment variable overriding `listen_addr`
pub const ENV_LISTEN_ADDR: &str = "LINECHAT_ADDR";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    pub listen_addr: String,

    /// Registry event channel size
    pub event_buffer: usize,

    /// Lines queued per client before new lines are dropped
    pub mailbox_capacity: usize,

    /// Bound on a single line write, in seconds
    pub write_timeout_secs: u64,

    /// Longest accepted incoming line, in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT.as_secs(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// `~/.config/linechat/config.toml` (platform equivalent via `dirs`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("linechat").join("config.toml"))
    }

    /// Applies the `LINECHAT_ADDR` environment override.
    pub fn with_env_overrides(self) -> Self {
        self.with_listen_addr(std::env::var(ENV_LISTEN_ADDR).ok())
    }

    /// Replaces `listen_addr` when `addr` is set and non-blank.
    pub fn with_listen_addr(mut self, addr: Option<String>) -> Self {
        if let Some(addr) = addr.filter(|a| !a.trim().is_empty()) {
            self.listen_addr = addr.trim().to_string();
        }
        self
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("listen_addr must not be empty".into()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be at least 1".into()));
        }
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid(
                "mailbox_capacity must be at least 1".into(),
            ));
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "write_timeout_secs must be at least 1".into(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "max_line_length must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Per-connection settings derived from this config.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            mailbox_capacity: self.mailbox_capacity,
            write_timeout: self.write_timeout(),
            max_line_length: self.max_line_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:5000");
        assert_eq!(config.event_buffer, 128);
        assert_eq!(config.mailbox_capacity, 32);
        assert_eq!(config.write_timeout_secs, 10);
        assert_eq!(config.max_line_length, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("listen_addr = \"127.0.0.1:6000\"\nmailbox_capacity = 8\n");

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:6000");
        assert_eq!(config.mailbox_capacity, 8);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        assert_eq!(config.write_timeout_secs, 10);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");

        let err = ServerConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let file = write_config("mailbox_capacity = \"lots\"\n");

        let err = ServerConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_listen_addr_override() {
        let config = ServerConfig::default()
            .with_listen_addr(Some(" 127.0.0.1:7000 ".into()));
        assert_eq!(config.listen_addr, "127.0.0.1:7000");

        let config = config.with_listen_addr(Some("   ".into()));
        assert_eq!(config.listen_addr, "127.0.0.1:7000");

        let config = config.with_listen_addr(None);
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cases = [
            ServerConfig {
                listen_addr: " ".into(),
                ..Default::default()
            },
            ServerConfig {
                event_buffer: 0,
                ..Default::default()
            },
            ServerConfig {
                mailbox_capacity: 0,
                ..Default::default()
            },
            ServerConfig {
                write_timeout_secs: 0,
                ..Default::default()
            },
            ServerConfig {
                max_line_length: 0,
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_connection_settings() {
        let config = ServerConfig {
            mailbox_capacity: 4,
            write_timeout_secs: 3,
            max_line_length: 100,
            ..Default::default()
        };

        let settings = config.connection_settings();
        assert_eq!(settings.mailbox_capacity, 4);
        assert_eq!(settings.write_timeout, Duration::from_secs(3));
        assert_eq!(settings.max_line_length, 100);
    }
}
