//! relay-server library crate.
//!
//! Puts the fanout relay on the network: accepts TCP connections, completes
//! the WebSocket handshake, and hands each session to the relay-core
//! dispatcher as an `AddClient` event.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! WebSocket clients (binary frames)
//!         ↕
//! [relay-server]
//!   ├── domain/             ServerConfig
//!   └── infrastructure/
//!         ├── config_file/  TOML config loading
//!         ├── ws_conn/      WebSocket stream → relay-core Connection
//!         └── ws_server/    accept loop, handshake, dispatcher lifetime
//!         ↕
//! [relay-core] Dispatcher
//! ```
//!
//! There is no application layer of its own: all relay logic lives in
//! relay-core, and this crate is pure transport plumbing.

/// Domain layer: server configuration (no I/O).
pub mod domain;

/// Infrastructure layer: config file, WebSocket adapter, accept loop.
pub mod infrastructure;
