//! Connection abstraction consumed by the relay core.
//!
//! A [`Connection`] is handed to the dispatcher by an external acceptor once
//! the transport handshake is complete.  The core never sees sockets: it only
//! talks to the two halves of the connection through the [`FrameSource`] and
//! [`FrameSink`] traits, and force-closes it through a [`ConnectionHandle`].
//!
//! # Ownership (for beginners)
//!
//! ```text
//! Connection ──into_parts()──►  source  → owned by the Reader task
//!                               sink    → owned by the Writer task
//!                               handle  → cloned into Reader, Writer, Registry
//! ```
//!
//! Each half is owned by exactly one task, so no locking is needed for I/O.
//! The handle is the only piece shared between tasks, and its `close()` is
//! idempotent so any of them may call it at any time.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Opaque identity of a live connection.
///
/// Minted from a random v4 UUID when the [`Connection`] is constructed, so two
/// live connections never share an id and an id is never handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Mints a fresh, unique connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// Kind of a non-binary frame, kept only for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Ping,
    Pong,
    Close,
    /// A raw transport frame the adapter could not classify.
    Raw,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Text => "text",
            FrameKind::Ping => "ping",
            FrameKind::Pong => "pong",
            FrameKind::Close => "close",
            FrameKind::Raw => "raw",
        };
        f.write_str(name)
    }
}

/// One discrete unit of transport-level delivery.
///
/// Only [`Frame::Binary`] carries an application payload.  Anything else is a
/// protocol violation from the relay's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Opaque payload, relayed byte-for-byte.
    Binary(Bytes),
    /// Any other frame kind.
    Other(FrameKind),
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure of a single connection's transport.
///
/// Transport errors are always local to one participant: the reader or writer
/// that observes one turns it into a removal of that participant and nothing
/// else.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection was closed, either by the remote peer or by a local
    /// call to [`ConnectionHandle::close`].
    #[error("connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transport-specific protocol error (e.g. a malformed WebSocket frame).
    #[error("websocket error: {0}")]
    WebSocket(String),
}

// ── Transport seams ───────────────────────────────────────────────────────────

/// Inbound half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next frame.  End of stream is reported as
    /// [`TransportError::Closed`].
    async fn next_frame(&mut self) -> Result<Frame, TransportError>;
}

/// Outbound half of a connection.
///
/// The production implementation wraps a WebSocket sink; tests use
/// `MockFrameSink` or the in-memory transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSink: Send {
    /// Writes `payload` as one binary frame.
    async fn send_binary(&mut self, payload: Bytes) -> Result<(), TransportError>;
}

// ── Close handle ──────────────────────────────────────────────────────────────

/// Cloneable handle used to force-close a connection.
///
/// Backed by a [`CancellationToken`]: `close()` may be called any number of
/// times from any task, and every pending [`guard`](Self::guard)ed operation
/// resolves with [`TransportError::Closed`] once it has been called.
#[derive(Debug, Clone, Default)]
pub struct ConnectionHandle {
    token: CancellationToken,
}

impl ConnectionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the connection.  Redundant calls are no-ops.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }

    /// Runs `operation` unless the connection is closed first.
    ///
    /// A close that happens while the operation is pending cancels it and
    /// yields [`TransportError::Closed`].  This is what unblocks a reader
    /// stuck on a read when the dispatcher evicts its connection.
    pub async fn guard<F, T>(&self, operation: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(TransportError::Closed),
            result = operation => result,
        }
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

/// A participant's bidirectional, message-framed channel.
pub struct Connection {
    id: ConnectionId,
    peer: String,
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    handle: ConnectionHandle,
}

/// The owned pieces of a [`Connection`], split for the reader and writer tasks.
pub struct ConnectionParts {
    pub id: ConnectionId,
    pub peer: String,
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn FrameSink>,
    pub handle: ConnectionHandle,
}

impl Connection {
    /// Wraps an accepted transport as a relay connection.
    ///
    /// `peer` is an opaque remote-endpoint description used only in logs
    /// (typically the socket address).
    pub fn new<S, K>(peer: impl Into<String>, source: S, sink: K) -> Self
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        Self::with_handle(peer, source, sink, ConnectionHandle::new())
    }

    /// Like [`new`](Self::new), but lets the transport share the close
    /// handle (e.g. to observe force-close from its own tasks).
    pub fn with_handle<S, K>(
        peer: impl Into<String>,
        source: S,
        sink: K,
        handle: ConnectionHandle,
    ) -> Self
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        Self {
            id: ConnectionId::new(),
            peer: peer.into(),
            source: Box::new(source),
            sink: Box::new(sink),
            handle,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn into_parts(self) -> ConnectionParts {
        ConnectionParts {
            id: self.id,
            peer: self.peer,
            source: self.source,
            sink: self.sink,
            handle: self.handle,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.handle.is_closed())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
