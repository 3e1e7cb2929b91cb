//! Connection writer task.
//!
//! One writer runs per connection, bound to that connection's outbound queue.
//! It is the queue's only consumer.
//!
//! # Termination
//!
//! - Queue closed or connection force-closed: exit quietly.  The dispatcher
//!   has already removed the entry, so no event is emitted.
//! - Write error: close the connection and emit `RemoveClient(WriteFailed)`.
//!   Removal is requested right away instead of waiting for the paired reader
//!   to notice, since a peer that never sends could keep that read pending
//!   indefinitely.
//!
//! Whatever is still queued on exit is discarded when the queue receiver is
//! dropped; later enqueue attempts by the dispatcher fail immediately.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{ConnectionHandle, ConnectionId, Event, FrameSink, RemovalReason};

/// Drains one outbound queue into one connection.
pub struct ConnectionWriter {
    id: ConnectionId,
    peer: String,
    sink: Box<dyn FrameSink>,
    queue: mpsc::Receiver<Bytes>,
    handle: ConnectionHandle,
    ingress: mpsc::Sender<Event>,
}

impl ConnectionWriter {
    pub fn new(
        id: ConnectionId,
        peer: String,
        sink: Box<dyn FrameSink>,
        queue: mpsc::Receiver<Bytes>,
        handle: ConnectionHandle,
        ingress: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            id,
            peer,
            sink,
            queue,
            handle,
            ingress,
        }
    }

    pub async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                () = self.handle.closed() => None,
                payload = self.queue.recv() => payload,
            };

            let Some(payload) = next else {
                debug!(id = %self.id, peer = %self.peer, "queue closed; writer exiting");
                return;
            };

            if let Err(err) = self.handle.guard(self.sink.send_binary(payload)).await {
                // Whoever closed the handle has already requested removal.
                if self.handle.is_closed() {
                    debug!(id = %self.id, peer = %self.peer, "connection closed during write");
                    return;
                }

                warn!(id = %self.id, peer = %self.peer, "got write error: {err}");
                self.handle.close();
                let _ = self
                    .ingress
                    .send(Event::RemoveClient {
                        id: self.id,
                        reason: RemovalReason::WriteFailed,
                    })
                    .await;
                return;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
