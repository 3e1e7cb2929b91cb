//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings of
//! the server binary.  It is built from defaults, optionally replaced by a
//! TOML file (see [`crate::infrastructure::config_file`]), and finally
//! overridden by CLI flags or environment variables in `main.rs`.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use relay_core::RelayConfig;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default time allowed for a TCP peer to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// All runtime configuration for the relay server.
///
/// # Example
///
/// ```rust
/// use relay_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8000);
/// assert_eq!(cfg.relay.queue_capacity.get(), 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.  Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,

    /// How long an accepted TCP connection may take to complete the
    /// WebSocket handshake before it is dropped.
    pub handshake_timeout: Duration,

    /// Queue and channel capacities handed to the dispatcher.
    pub relay: RelayConfig,
}

impl Default for ServerConfig {
    /// | Field             | Default          |
    /// |-------------------|------------------|
    /// | bind_addr         | `0.0.0.0:8000`   |
    /// | handshake_timeout | 10 seconds       |
    /// | relay             | `RelayConfig::default()` (K = 5) |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            relay: RelayConfig::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_all_interfaces_on_port_8000() {
        // Arrange / Act
        let cfg = ServerConfig::default();

        // Assert
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn test_default_handshake_timeout_is_10s() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_default_relay_config_is_core_default() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.relay, RelayConfig::default());
    }
}
