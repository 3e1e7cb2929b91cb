//! Infrastructure layer for relay-server.
//!
//! # Responsibilities
//!
//! - Loading the TOML configuration file
//! - Binding the TCP listener and performing the WebSocket upgrade
//! - Adapting WebSocket streams to relay-core's `FrameSource` / `FrameSink`
//! - Owning the dispatcher task and the graceful shutdown sequence

pub mod config_file;
pub mod ws_conn;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use config_file::{load_config, ConfigError};
pub use ws_server::{run_server, RelayServer};
