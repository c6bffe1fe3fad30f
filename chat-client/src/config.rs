//! Configuration loading for chat-client.
//!
//! Configuration is loaded from a TOML file (default: `chatsync.toml`).
//! Every section and field is optional and falls back to a default.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for chat-client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Remote message store.
    #[serde(default)]
    pub store: StoreConfig,
    /// File attachment storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Live feed.
    #[serde(default)]
    pub live: LiveConfig,
}

/// Remote message store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the backend (e.g. `https://project.supabase.co`).
    #[serde(default)]
    pub base_url: String,
    /// API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: String,
    /// Table holding messages (default: `messages`).
    #[serde(default = "default_table")]
    pub table: String,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// File attachment storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket uploaded files go to (default: `chat-files`).
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

/// Live feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Polling interval for the polling feed, in milliseconds (default: 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Capacity of per-session event queues (default: 256).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

// Default value functions
fn default_table() -> String {
    "messages".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_bucket() -> String {
    "chat-files".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            table: default_table(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StoreConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LiveConfig {
    /// Polling interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Set the store base URL.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.store.base_url = url.to_string();
        self
    }

    /// Set the store API key.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.store.api_key = key.to_string();
        self
    }

    /// Set the attachment bucket.
    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.storage.bucket = bucket.to_string();
        self
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.live.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Check that the configuration is usable.
    ///
    /// The base URL is only required by the HTTP store; use
    /// [`validate_remote`](Self::validate_remote) before building one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.table.trim().is_empty() {
            return Err(ConfigError::Invalid("store.table must not be empty".into()));
        }
        if self.store.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "store.request_timeout_secs must be positive".into(),
            ));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket must not be empty".into()));
        }
        if self.live.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "live.poll_interval_ms must be positive".into(),
            ));
        }
        if self.live.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "live.channel_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus a base URL for remote access.
    pub fn validate_remote(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.store.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("store.base_url must be set".into()));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Configuration values are unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}
