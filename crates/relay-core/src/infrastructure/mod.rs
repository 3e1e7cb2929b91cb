//! Transports that need no sockets.
//!
//! Socket-backed transports (WebSocket) live in the server crate; this crate
//! only ships the in-memory one used by tests and embedders.

pub mod memory;
