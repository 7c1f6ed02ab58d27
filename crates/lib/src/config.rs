//! Client configuration.
//!
//! # Example
//!
//! ```
//! use coordtree::config::ClientConfig;
//!
//! // Only the addresses are required, everything else has a default.
//! let config = ClientConfig::from_json_str(r#"{ "server_addresses": "zk1:2181,zk2:2181" }"#)?;
//! assert_eq!(config.session_timeout_ms, 2_000);
//! assert_eq!(config.retry_count, 1);
//!
//! let config = ClientConfig {
//!     retry_count: 3,
//!     ..ClientConfig::new("localhost:2181")
//! };
//! config.validate()?;
//! # Ok::<(), coordtree::Error>(())
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_MAX_BLOCK_UNTIL_CONNECTED_SECS,
    DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_SLEEP_MS,
    DEFAULT_SESSION_TIMEOUT_MS,
};
use crate::transport::{RetryPolicy, SessionTimeouts};

/// Errors raised while loading or validating a [`ClientConfig`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    pub fn is_invalid(&self) -> bool {
        matches!(self, ConfigError::Invalid { .. })
    }
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err)
    }
}

/// Settings for connecting to the coordination service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Comma separated `host:port` list.
    pub server_addresses: String,

    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Extra attempts for a request failing with a retryable fault.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_sleep_ms")]
    pub retry_sleep_ms: u64,

    /// Upper bound for any single store operation.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// How long [`Client::start`](crate::client::Client::start) waits for the
    /// first connection.
    #[serde(default = "default_max_block_until_connected_secs")]
    pub max_block_until_connected_secs: u64,
}

fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

fn default_retry_sleep_ms() -> u64 {
    DEFAULT_RETRY_SLEEP_MS
}

fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

fn default_max_block_until_connected_secs() -> u64 {
    DEFAULT_MAX_BLOCK_UNTIL_CONNECTED_SECS
}

impl ClientConfig {
    /// A config for `server_addresses` with every other field defaulted.
    pub fn new(server_addresses: impl Into<String>) -> Self {
        Self {
            server_addresses: server_addresses.into(),
            connection_timeout_ms: default_connection_timeout_ms(),
            session_timeout_ms: default_session_timeout_ms(),
            retry_count: default_retry_count(),
            retry_sleep_ms: default_retry_sleep_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            max_block_until_connected_secs: default_max_block_until_connected_secs(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server_addresses
            .split(',')
            .all(|address| address.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "server_addresses",
                reason: "at least one address is required",
            });
        }
        let timeouts = [
            ("connection_timeout_ms", self.connection_timeout_ms),
            ("session_timeout_ms", self.session_timeout_ms),
            ("operation_timeout_ms", self.operation_timeout_ms),
            ("max_block_until_connected_secs", self.max_block_until_connected_secs),
        ];
        if let Some((field, _)) = timeouts.into_iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::n_times(self.retry_count, Duration::from_millis(self.retry_sleep_ms))
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            connection: Duration::from_millis(self.connection_timeout_ms),
            session: Duration::from_millis(self.session_timeout_ms),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn max_block_until_connected(&self) -> Duration {
        Duration::from_secs(self.max_block_until_connected_secs)
    }
}
