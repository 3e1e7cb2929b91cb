//! Connection reader task.
//!
//! One reader runs per connection.  It turns inbound frames into dispatcher
//! events and never touches the registry or any queue directly.
//!
//! ```text
//! Binary frame   → Broadcast { sender, payload }, keep reading
//! Other frame    → close, RemoveClient(ProtocolViolation), stop
//! Read error/EOF → close, RemoveClient(ReadFailed), stop
//! ```

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{
    ConnectionHandle, ConnectionId, Event, Frame, FrameSource, RemovalReason, TransportError,
};

/// Pulls frames off one connection and forwards them to the dispatcher.
pub struct ConnectionReader {
    id: ConnectionId,
    peer: String,
    source: Box<dyn FrameSource>,
    handle: ConnectionHandle,
    ingress: mpsc::Sender<Event>,
}

impl ConnectionReader {
    pub fn new(
        id: ConnectionId,
        peer: String,
        source: Box<dyn FrameSource>,
        handle: ConnectionHandle,
        ingress: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            id,
            peer,
            source,
            handle,
            ingress,
        }
    }

    /// Reads until the connection fails, misbehaves, or is force-closed.
    pub async fn run(mut self) {
        loop {
            match self.handle.guard(self.source.next_frame()).await {
                Ok(Frame::Binary(payload)) => {
                    let event = Event::Broadcast {
                        sender: self.id,
                        payload,
                    };
                    if self.ingress.send(event).await.is_err() {
                        debug!(id = %self.id, peer = %self.peer, "dispatcher gone; reader exiting");
                        self.handle.close();
                        return;
                    }
                }
                Ok(Frame::Other(kind)) => {
                    warn!(id = %self.id, peer = %self.peer, "sent {kind} frame, expected binary");
                    self.stop(RemovalReason::ProtocolViolation).await;
                    return;
                }
                Err(err) => {
                    self.log_read_error(&err);
                    self.stop(RemovalReason::ReadFailed).await;
                    return;
                }
            }
        }
    }

    fn log_read_error(&self, err: &TransportError) {
        if self.handle.is_closed() {
            debug!(id = %self.id, peer = %self.peer, "connection closed; reader exiting");
        } else {
            match err {
                TransportError::Closed => {
                    debug!(id = %self.id, peer = %self.peer, "peer hung up")
                }
                other => warn!(id = %self.id, peer = %self.peer, "got read error: {other}"),
            }
        }
    }

    async fn stop(&mut self, reason: RemovalReason) {
        self.handle.close();
        // A send error only means the dispatcher is already gone.
        let _ = self
            .ingress
            .send(Event::RemoveClient {
                id: self.id,
                reason,
            })
            .await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
