//! In-memory transport.
//!
//! [`pair`] builds a [`Connection`] whose far end is a [`RemotePeer`] driven
//! directly by test code (or by an embedding application that does not need
//! sockets).  The remote peer can send frames, receive what the writer
//! delivers, stop reading to simulate a slow client, and hang up.
//!
//! ```text
//! RemotePeer::send_*  ──unbounded──►  MemorySource  → Reader
//! RemotePeer::recv    ◄──bounded────  MemorySink    ← Writer
//!                        (wire_capacity, gated by stall/resume)
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::domain::{
    Connection, ConnectionHandle, ConnectionId, Frame, FrameKind, FrameSink, FrameSource,
    TransportError,
};

/// Inbound half of an in-memory connection.
pub struct MemorySource {
    inbound: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        self.inbound.recv().await.ok_or(TransportError::Closed)
    }
}

/// Outbound half of an in-memory connection.
pub struct MemorySink {
    outbound: mpsc::Sender<Bytes>,
    stalled: watch::Receiver<bool>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_binary(&mut self, payload: Bytes) -> Result<(), TransportError> {
        // A stalled peer accepts nothing, exactly like a full socket buffer.
        let open = self.stalled.wait_for(|stalled| !*stalled).await.is_ok();
        if !open {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(payload)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// The remote end of an in-memory connection.
pub struct RemotePeer {
    id: ConnectionId,
    inbound: Option<mpsc::UnboundedSender<Frame>>,
    outbound: mpsc::Receiver<Bytes>,
    stall: watch::Sender<bool>,
    handle: ConnectionHandle,
}

/// Creates a connected in-memory pair.
///
/// `wire_capacity` is how many delivered payloads may sit unread on the
/// remote side before the writer's next write blocks.
pub fn pair(peer: impl Into<String>, wire_capacity: usize) -> (Connection, RemotePeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::channel(wire_capacity.max(1));
    let (stall_tx, stall_rx) = watch::channel(false);
    let handle = ConnectionHandle::new();

    let connection = Connection::with_handle(
        peer,
        MemorySource {
            inbound: inbound_rx,
        },
        MemorySink {
            outbound: outbound_tx,
            stalled: stall_rx,
        },
        handle.clone(),
    );
    let remote = RemotePeer {
        id: connection.id(),
        inbound: Some(inbound_tx),
        outbound: outbound_rx,
        stall: stall_tx,
        handle,
    };
    (connection, remote)
}

impl RemotePeer {
    /// Id of the relay-side connection this peer is attached to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one binary frame to the relay.
    pub fn send_binary(&self, payload: impl Into<Bytes>) -> Result<(), TransportError> {
        self.send_frame(Frame::Binary(payload.into()))
    }

    /// Sends a text frame, which the relay treats as a protocol violation.
    pub fn send_text(&self) -> Result<(), TransportError> {
        self.send_frame(Frame::Other(FrameKind::Text))
    }

    pub fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        self.inbound
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    /// Waits for the next payload delivered by the relay.
    ///
    /// Returns `None` once the relay side has gone away and everything
    /// already delivered has been read.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.outbound.recv().await
    }

    /// Returns an already delivered payload without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.outbound.try_recv().ok()
    }

    /// Stops accepting deliveries: the relay's next write blocks until
    /// [`resume`](Self::resume).
    pub fn stall(&self) {
        self.stall.send_replace(true);
    }

    pub fn resume(&self) {
        self.stall.send_replace(false);
    }

    /// Hangs up the sending direction; the relay's reader sees end of stream.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Stops receiving; the relay's next write fails.
    pub fn stop_receiving(&mut self) {
        self.outbound.close();
    }

    /// Whether the relay has force-closed this connection.
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Resolves once the relay has force-closed this connection.
    pub async fn closed(&self) {
        self.handle.closed().await;
    }
}
