//! Domain layer for relay-core.
//!
//! Pure types shared by every other layer: connection identity and the
//! transport traits, the closed event set, and configuration.  Nothing here
//! spawns tasks or owns a registry.

pub mod config;
pub mod connection;
pub mod event;

pub use config::RelayConfig;
pub use connection::{
    Connection, ConnectionHandle, ConnectionId, ConnectionParts, Frame, FrameKind, FrameSink,
    FrameSource, TransportError,
};
pub use event::{Event, LifecycleEvent, RemovalReason};
