//! Client configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML/YAML/JSON file, and `TUTORLINK_*` environment variables
//! (`__` separates nested keys, e.g. `TUTORLINK_LOGGING__LEVEL=debug`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tutorlink_http::{NegotiatorConfig, RetryPolicy};
use url::Url;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TUTORLINK";

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// A value is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Everything the client needs to reach one capability server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL
    pub base_url: String,
    /// Event-stream handshake path
    pub sse_path: String,
    /// Handshake timeout in milliseconds
    pub handshake_timeout_ms: u64,
    /// Per-call timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Handshake attempts before giving up
    pub max_connect_attempts: u32,
    /// Delay between handshake attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Delay before retrying a read after the session was invalidated
    pub session_retry_delay_ms: u64,
    /// User agent override
    pub user_agent: Option<String>,
    /// Ask for JSON replies from tools that advertise it
    pub prefer_structured: bool,
    /// Send `initialize` after the handshake
    pub initialize: bool,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            sse_path: "/sse".to_string(),
            handshake_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            max_connect_attempts: 3,
            retry_delay_ms: 2_000,
            session_retry_delay_ms: 1_000,
            user_agent: None,
            prefer_structured: true,
            initialize: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `TUTORLINK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if a variable has the wrong type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(environment(ENV_PREFIX))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load from a file (format from its extension), then apply
    /// `TUTORLINK_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Like [`ClientConfig::from_file`] with a custom environment prefix.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = config::Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment(env_prefix))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Reject values the client cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparseable base URL, a zero
    /// attempt count, or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;
        if self.max_connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.handshake_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL as a [`Url`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if it does not parse.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {e}", self.base_url)))
    }

    /// Handshake timeout
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Per-call timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay between handshake attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Delay before a read is retried on a fresh session
    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_millis(self.session_retry_delay_ms)
    }

    /// Fixed-interval policy for handshake attempts
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::Fixed {
            interval: self.retry_delay(),
            max_attempts: self.max_connect_attempts,
        }
    }

    /// Handshake settings for the negotiator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the base URL does not parse.
    pub fn negotiator_config(&self) -> Result<NegotiatorConfig, ConfigError> {
        let mut negotiator = NegotiatorConfig::new(self.parsed_base_url()?);
        negotiator.sse_path = self.sse_path.clone();
        negotiator.handshake_timeout = self.handshake_timeout();
        negotiator.request_timeout = self.request_timeout();
        negotiator.user_agent = self.user_agent.clone();
        negotiator.initialize = self.initialize;
        Ok(negotiator)
    }
}

fn environment(prefix: &str) -> config::Environment {
    config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.session_retry_delay(), Duration::from_secs(1));
        assert_eq!(config.retry_policy().max_attempts(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ClientConfig {
            max_connect_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ClientConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_toml_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "base_url = \"http://tutor.internal:8080\"\nmax_connect_attempts = 5\n\n[logging]\njson = true"
        )
        .unwrap();

        let config = ClientConfig::from_file_with_prefix(file.path(), "TUTORLINK_TEST_UNSET").unwrap();
        assert_eq!(config.base_url, "http://tutor.internal:8080");
        assert_eq!(config.max_connect_attempts, 5);
        assert_eq!(config.retry_delay_ms, 2_000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_errors() {
        assert!(matches!(
            ClientConfig::from_file("/definitely/missing.toml"),
            Err(ConfigError::FileNotFound(_))
        ));

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            ClientConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_negotiator_config() {
        let config = ClientConfig {
            sse_path: "/events".to_string(),
            initialize: false,
            ..Default::default()
        };
        let negotiator = config.negotiator_config().unwrap();
        assert_eq!(negotiator.sse_path, "/events");
        assert!(!negotiator.initialize);
        assert_eq!(negotiator.handshake_timeout, Duration::from_secs(10));
    }
}
