//! Fanout relay server: entry point.
//!
//! Accepts WebSocket connections and relays every binary message a client
//! sends to every other connected client.  A client that falls more than
//! `--queue-capacity` messages behind is disconnected.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>            TOML configuration file
//!   --bind <ADDR>              Listen address [default from config: 0.0.0.0:8000]
//!   --queue-capacity <K>       Per-client outbound queue capacity [default: 5]
//!   --ingress-capacity <N>     Dispatcher ingress channel capacity [default: 64]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present; both take precedence over
//! the configuration file.
//!
//! | Variable                 | Description                        |
//! |--------------------------|------------------------------------|
//! | `RELAY_CONFIG`           | Path of the TOML configuration file |
//! | `RELAY_BIND`             | Listen address                     |
//! | `RELAY_QUEUE_CAPACITY`   | Per-client outbound queue capacity |
//! | `RELAY_INGRESS_CAPACITY` | Dispatcher ingress capacity        |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_server::domain::ServerConfig;
use relay_server::infrastructure::{load_config, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Fanout relay server.
///
/// Relays binary WebSocket messages from each client to all other clients.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "WebSocket fanout relay: every binary message goes to every other client",
    version
)]
struct Cli {
    /// TOML configuration file.  Flags below override its values.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. `0.0.0.0:8000`.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// Outbound queue capacity per client (K).
    ///
    /// A client with K undelivered messages is disconnected on the next
    /// broadcast addressed to it.
    #[arg(long, env = "RELAY_QUEUE_CAPACITY")]
    queue_capacity: Option<NonZeroUsize>,

    /// Capacity of the channel feeding the dispatcher.
    #[arg(long, env = "RELAY_INGRESS_CAPACITY")]
    ingress_capacity: Option<NonZeroUsize>,
}

impl Cli {
    /// Builds the effective [`ServerConfig`]: defaults, then the config file,
    /// then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or `--bind` is
    /// not a valid socket address.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.bind_addr = bind
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
        }
        if let Some(k) = self.queue_capacity {
            config.relay.queue_capacity = k;
        }
        if let Some(n) = self.ingress_capacity {
            config.relay.ingress_capacity = n;
        }

        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` controls verbosity; fall back to `info` when absent or invalid.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "fanout relay starting: bind={}, queue_capacity={}",
        config.bind_addr, config.relay.queue_capacity
    );

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C; initiating graceful shutdown"),
            Err(e) => {
                error!("failed to listen for Ctrl+C signal: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    run_server(config, shutdown).await?;

    info!("fanout relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("relay-server").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_without_flags_yields_default_config() {
        // Arrange
        let cli = Cli {
            config: None,
            bind: None,
            queue_capacity: None,
            ingress_capacity: None,
        };

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_cli_bind_override() {
        let config = cli(&["--bind", "127.0.0.1:9999"])
            .into_server_config()
            .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9999");
    }

    #[test]
    fn test_cli_queue_capacity_override() {
        let config = cli(&["--queue-capacity", "12"])
            .into_server_config()
            .unwrap();
        assert_eq!(config.relay.queue_capacity.get(), 12);
    }

    #[test]
    fn test_cli_ingress_capacity_override() {
        let config = cli(&["--ingress-capacity", "256"])
            .into_server_config()
            .unwrap();
        assert_eq!(config.relay.ingress_capacity.get(), 256);
    }

    #[test]
    fn test_cli_rejects_zero_queue_capacity() {
        let result = Cli::try_parse_from(["relay-server", "--queue-capacity", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_bind_returns_error() {
        // Arrange
        let cli = Cli {
            config: None,
            bind: Some("not.an.address".to_string()),
            queue_capacity: None,
            ingress_capacity: None,
        };

        // Act
        let result = cli.into_server_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file_returns_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/relay.toml")),
            bind: None,
            queue_capacity: None,
            ingress_capacity: None,
        };

        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("relay_cli_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(
            &path,
            "[server]\nbind_addr = \"127.0.0.1:7000\"\n[relay]\nqueue_capacity = 3\n",
        )
        .unwrap();
        let cli = Cli {
            config: Some(path),
            bind: None,
            queue_capacity: NonZeroUsize::new(9),
            ingress_capacity: None,
        };

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert: file supplies the address, the flag wins for K
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:7000");
        assert_eq!(config.relay.queue_capacity.get(), 9);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }
}
