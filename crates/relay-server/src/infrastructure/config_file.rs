//! TOML configuration file for the server binary.
//!
//! Every field is optional; anything left out keeps its default:
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:8000"
//! handshake_timeout_secs = 10
//!
//! [relay]
//! queue_capacity = 5
//! ingress_capacity = 64
//! lifecycle_capacity = 64
//! ```
//!
//! The file is first deserialised into a loose schema (strings and plain
//! integers), then validated into a [`ServerConfig`].  Validation failures are
//! reported as [`ConfigError::InvalidValue`] naming the offending key.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_core::domain::config::{
    DEFAULT_INGRESS_CAPACITY, DEFAULT_LIFECYCLE_CAPACITY, DEFAULT_QUEUE_CAPACITY,
};
use relay_core::RelayConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::config::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT};
use crate::domain::ServerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not acceptable.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// On-disk layout of the configuration file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub relay: RelaySection,
}

/// `[server]` table.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

/// `[relay]` table.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    /// Outbound queue capacity K per participant.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_ingress_capacity")]
    pub ingress_capacity: usize,
    #[serde(default = "default_lifecycle_capacity")]
    pub lifecycle_capacity: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_addr() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}
fn default_handshake_timeout_secs() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT.as_secs()
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY.get()
}
fn default_ingress_capacity() -> usize {
    DEFAULT_INGRESS_CAPACITY.get()
}
fn default_lifecycle_capacity() -> usize {
    DEFAULT_LIFECYCLE_CAPACITY.get()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            ingress_capacity: default_ingress_capacity(),
            lifecycle_capacity: default_lifecycle_capacity(),
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

fn non_zero(key: &'static str, value: usize) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or(ConfigError::InvalidValue {
        key,
        reason: "must be at least 1".to_string(),
    })
}

impl FileConfig {
    /// Validates the loose schema into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparsable bind address,
    /// a zero handshake timeout, or a zero capacity.
    pub fn into_server_config(self) -> Result<ServerConfig, ConfigError> {
        let bind_addr: SocketAddr =
            self.server
                .bind_addr
                .parse()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "server.bind_addr",
                    reason: format!("'{}': {e}", self.server.bind_addr),
                })?;

        if self.server.handshake_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.handshake_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        let relay = RelayConfig {
            queue_capacity: non_zero("relay.queue_capacity", self.relay.queue_capacity)?,
            ingress_capacity: non_zero("relay.ingress_capacity", self.relay.ingress_capacity)?,
            lifecycle_capacity: non_zero(
                "relay.lifecycle_capacity",
                self.relay.lifecycle_capacity,
            )?,
        };

        Ok(ServerConfig {
            bind_addr,
            handshake_timeout: Duration::from_secs(self.server.handshake_timeout_secs),
            relay,
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration from TOML text.
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML or unknown keys,
/// [`ConfigError::InvalidValue`] for values that fail validation.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let file: FileConfig = toml::from_str(content)?;
    file.into_server_config()
}

/// Loads configuration from the file at `path`.
///
/// A path given explicitly must exist: a missing file is an error, not a
/// silent fallback to defaults.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, otherwise as
/// [`parse_config`].
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
