//! Fanout relay terminal client: entry point.
//!
//! Sends each line typed on stdin to the relay and prints every message the
//! relay delivers.
//!
//! # Usage
//!
//! ```text
//! relay-client [OPTIONS]
//!
//! Options:
//!   --url <URL>              Relay WebSocket URL [default: ws://127.0.0.1:8000/ws]
//!   --read-delay-ms <MS>     Pause after each received message [default: 0]
//!   --listen-only            Do not read stdin, only print received messages
//! ```
//!
//! A slow reader, e.g. `relay-client --listen-only --read-delay-ms 10000`,
//! is disconnected by the relay once it falls too far behind.

use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_client::{run, ClientConfig, SessionEnd, DEFAULT_URL};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "relay-client",
    about = "Terminal client for the fanout relay",
    version
)]
struct Cli {
    /// WebSocket URL of the relay.
    #[arg(long, default_value = DEFAULT_URL, env = "RELAY_URL")]
    url: String,

    /// Milliseconds to pause after each received message.
    #[arg(long, default_value_t = 0, env = "RELAY_READ_DELAY_MS")]
    read_delay_ms: u64,

    /// Do not read stdin; only print received messages.
    #[arg(long)]
    listen_only: bool,
}

impl Cli {
    fn into_client_config(self) -> ClientConfig {
        ClientConfig {
            url: self.url,
            read_delay: Duration::from_millis(self.read_delay_ms),
            listen_only: self.listen_only,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only relayed messages.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_client_config();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    match run(&config, stdin, stdout).await? {
        SessionEnd::InputClosed => info!("input closed; bye"),
        SessionEnd::ServerClosed => warn!("relay closed the connection"),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
