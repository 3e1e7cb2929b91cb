//! # relay-core
//!
//! Core of the fanout relay: every binary message a participant sends is
//! delivered to every other connected participant, never back to the sender.
//!
//! The crate knows nothing about sockets.  An external acceptor completes the
//! transport handshake, wraps the result as a [`Connection`], and submits it
//! to the [`Dispatcher`] as an [`Event::AddClient`].
//!
//! # Architecture overview
//!
//! ```text
//!             ┌──────────── ingress (mpsc, total order) ◄──────────┐
//!             ▼                                                    │
//!        Dispatcher ── owns ──► Registry { id → outbound queue }   │
//!             │                                                    │
//!   per participant spawns:                                        │
//!       Reader  (frames → Broadcast / RemoveClient) ───────────────┤
//!       Writer  (queue → frames, write error → RemoveClient) ──────┘
//! ```
//!
//! - **`domain`** – connection identity and transport traits, the closed
//!   [`Event`] set, [`RelayConfig`].
//! - **`application`** – dispatcher, registry, reader and writer tasks.
//! - **`infrastructure`** – in-memory transport for tests and embedding.
//!
//! # Backpressure
//!
//! Every participant has a bounded outbound queue of capacity K.  Broadcast
//! never waits on a queue: a recipient whose queue is full is evicted once the
//! fan-out pass is over, so a stalled client loses its session instead of
//! stalling everybody else.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{Dispatcher, Registry};
pub use domain::{
    Connection, ConnectionHandle, ConnectionId, Event, Frame, FrameKind, FrameSink, FrameSource,
    LifecycleEvent, RelayConfig, RemovalReason, TransportError,
};
