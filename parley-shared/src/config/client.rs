use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors raised while resolving a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is neither `yaml`/`yml` nor `json`.
    #[error("unsupported configuration format for {0}; use .yaml or .json")]
    UnsupportedFormat(PathBuf),

    /// The file content did not deserialize.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// An environment override held an unusable value.
    #[error("invalid {var} value: {message}")]
    InvalidEnv { var: &'static str, message: String },

    /// The resolved configuration failed validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Bounded exponential backoff for live transport reconnection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// The main configuration structure for the Parley client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST collaborators (auth, history, profiles, presence).
    pub server_url: Url,

    /// Live channel endpoint; the session token is appended as `?token=`.
    pub ws_url: Url,

    /// Logging level or `EnvFilter` directive.
    pub log_level: String,

    /// Seconds between presence polls.
    pub presence_interval_secs: u64,

    /// Upper bound on establishing the live connection.
    pub connect_timeout_secs: u64,

    /// Upper bound on writing one outbound frame.
    pub send_timeout_secs: u64,

    /// Reconnect policy for dropped live connections.
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClientConfig {
    /// Generates a default configuration pointing at a local server.
    ///
    /// # Panics
    /// Never; the built-in URLs are constant and valid.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            server_url: Url::parse("http://127.0.0.1:8000/").expect("static server url"),
            ws_url: Url::parse("ws://127.0.0.1:8000/ws").expect("static ws url"),
            log_level: "info".to_string(),
            presence_interval_secs: 5,
            connect_timeout_secs: 10,
            send_timeout_secs: 5,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Environment variables only apply to values the file left at their
    /// defaults.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the file cannot be read or parsed, an
    /// override is malformed, or the result fails [`ClientConfig::validate`].
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let defaults = Self::with_defaults();
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => defaults.clone(),
        };

        if config.server_url == defaults.server_url {
            if let Ok(value) = env::var("PARLEY_SERVER_URL") {
                config.server_url = parse_url("PARLEY_SERVER_URL", &value)?;
            }
        }
        if config.ws_url == defaults.ws_url {
            if let Ok(value) = env::var("PARLEY_WS_URL") {
                config.ws_url = parse_url("PARLEY_WS_URL", &value)?;
            }
        }
        if config.log_level == defaults.log_level {
            if let Ok(value) = env::var("PARLEY_LOG_LEVEL") {
                config.log_level = value;
            }
        }
        if config.presence_interval_secs == defaults.presence_interval_secs {
            if let Ok(value) = env::var("PARLEY_PRESENCE_INTERVAL_SECS") {
                config.presence_interval_secs =
                    value.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: "PARLEY_PRESENCE_INTERVAL_SECS",
                        message: format!("`{value}` is not a whole number of seconds"),
                    })?;
            }
        }

        config.validate().map_err(ConfigError::Invalid)?;
        debug!(server = %config.server_url, ws = %config.ws_url, "client configuration resolved");
        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => {
                serde_yml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            _ => Err(ConfigError::UnsupportedFormat(path)),
        }
    }

    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.ws_url.scheme(), "ws" | "wss") {
            errors.push(format!(
                "ws_url must use ws:// or wss://, got {}://",
                self.ws_url.scheme()
            ));
        }
        if !matches!(self.server_url.scheme(), "http" | "https") {
            errors.push(format!(
                "server_url must use http:// or https://, got {}://",
                self.server_url.scheme()
            ));
        }
        if self.presence_interval_secs == 0 {
            errors.push("presence_interval_secs must be greater than 0".to_string());
        }
        if self.connect_timeout_secs == 0 {
            errors.push("connect_timeout_secs must be greater than 0".to_string());
        }
        if self.send_timeout_secs == 0 {
            errors.push("send_timeout_secs must be greater than 0".to_string());
        }
        if self.reconnect.max_attempts == 0 {
            errors.push("reconnect.max_attempts must be greater than 0".to_string());
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            errors.push("reconnect.base_delay_ms must not exceed reconnect.max_delay_ms".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Presence poll cadence.
    #[must_use]
    pub fn presence_interval(&self) -> Duration {
        Duration::from_secs(self.presence_interval_secs)
    }

    /// Live connect deadline.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-frame write deadline.
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::InvalidEnv {
        var,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::Builder;

    fn clear_env() {
        unsafe {
            env::remove_var("PARLEY_SERVER_URL");
            env::remove_var("PARLEY_WS_URL");
            env::remove_var("PARLEY_LOG_LEVEL");
            env::remove_var("PARLEY_PRESENCE_INTERVAL_SECS");
        }
    }

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::with_defaults();

        assert!(config.validate().is_ok());
        assert_eq!(config.presence_interval(), Duration::from_secs(5));
        assert_eq!(config.ws_url.as_str(), "ws://127.0.0.1:8000/ws");
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    #[serial]
    fn test_load_without_file_uses_defaults() {
        clear_env();
        let config = ClientConfig::load_config(None).unwrap();
        assert_eq!(config, ClientConfig::with_defaults());
    }

    #[test]
    #[serial]
    fn test_load_yaml_partial_file() {
        clear_env();
        let file = write_temp(
            ".yaml",
            "server_url: \"https://chat.example/\"\npresence_interval_secs: 12\nreconnect:\n  max_attempts: 9\n",
        );

        let config = ClientConfig::load_config(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.server_url.as_str(), "https://chat.example/");
        assert_eq!(config.presence_interval_secs, 12);
        assert_eq!(config.reconnect.max_attempts, 9);
        assert_eq!(config.reconnect.base_delay_ms, 500);
        assert_eq!(config.send_timeout_secs, 5);
    }

    #[test]
    #[serial]
    fn test_load_json_file() {
        clear_env();
        let file = write_temp(".json", r#"{"ws_url":"wss://chat.example/ws","log_level":"debug"}"#);

        let config = ClientConfig::load_config(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.ws_url.as_str(), "wss://chat.example/ws");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_unsupported_extension() {
        clear_env();
        let file = write_temp(".ini", "server_url = nope");

        let err = ClientConfig::load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    #[serial]
    fn test_env_overrides_defaults() {
        clear_env();
        unsafe {
            env::set_var("PARLEY_WS_URL", "ws://10.0.0.2:9000/ws");
            env::set_var("PARLEY_PRESENCE_INTERVAL_SECS", "30");
        }

        let config = ClientConfig::load_config(None).unwrap();
        clear_env();

        assert_eq!(config.ws_url.as_str(), "ws://10.0.0.2:9000/ws");
        assert_eq!(config.presence_interval_secs, 30);
    }

    #[test]
    #[serial]
    fn test_env_does_not_override_file_values() {
        clear_env();
        let file = write_temp(".yaml", "log_level: trace\n");
        unsafe {
            env::set_var("PARLEY_LOG_LEVEL", "warn");
        }

        let config = ClientConfig::load_config(Some(file.path().to_path_buf())).unwrap();
        clear_env();

        assert_eq!(config.log_level, "trace");
    }

    #[test]
    #[serial]
    fn test_invalid_interval_env() {
        clear_env();
        unsafe {
            env::set_var("PARLEY_PRESENCE_INTERVAL_SECS", "soon");
        }

        let err = ClientConfig::load_config(None).unwrap_err();
        clear_env();

        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "PARLEY_PRESENCE_INTERVAL_SECS",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = ClientConfig::with_defaults();
        config.ws_url = Url::parse("http://127.0.0.1:8000/ws").unwrap();
        config.presence_interval_secs = 0;
        config.reconnect.base_delay_ms = 60_000;

        let errors = config.validate().unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("ws_url")));
        assert!(errors.iter().any(|e| e.contains("presence_interval_secs")));
        assert!(errors.iter().any(|e| e.contains("base_delay_ms")));
    }
}
