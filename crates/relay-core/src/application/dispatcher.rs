//! The dispatcher: single serialization point of the relay.
//!
//! The dispatcher drains one multi-producer ingress channel and applies each
//! [`Event`] in arrival order.  Because it is the only task that touches the
//! [`Registry`] and the producer ends of the outbound queues, none of them
//! need a lock.
//!
//! # Liveness
//!
//! [`Dispatcher::handle`] is synchronous.  Per event it performs map
//! operations, one non-blocking `try_send` per recipient, and task spawns,
//! never I/O.  A stalled participant can fill its own queue and get evicted,
//! but it can never hold up event processing for anyone else.
//!
//! # Event flow
//!
//! ```text
//!   acceptor ──AddClient──────────┐
//!   readers  ──Broadcast/Remove──►│ ingress (mpsc) ─► Dispatcher ─► queues ─► writers
//!   writers  ──RemoveClient───────┘                      │
//!                                                        └─► LifecycleEvent (broadcast)
//! ```

use std::future::Future;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::application::reader::ConnectionReader;
use crate::application::registry::{Participant, Registry};
use crate::application::writer::ConnectionWriter;
use crate::domain::{
    Connection, ConnectionId, ConnectionParts, Event, LifecycleEvent, RelayConfig, RemovalReason,
};

/// Owner of the registry and the backpressure/eviction policy.
pub struct Dispatcher {
    config: RelayConfig,
    registry: Registry,
    events: mpsc::Receiver<Event>,
    // Weak, so the ingress closes once the acceptor and every reader/writer
    // have dropped their senders.
    ingress: mpsc::WeakSender<Event>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
}

impl Dispatcher {
    /// Creates a dispatcher and returns it with the sender for its ingress.
    ///
    /// Hand clones of the sender to whatever accepts connections; each
    /// accepted connection is submitted as [`Event::AddClient`].
    pub fn new(config: RelayConfig) -> (Self, mpsc::Sender<Event>) {
        let (tx, rx) = mpsc::channel(config.ingress_capacity.get());
        let (lifecycle, _) = broadcast::channel(config.lifecycle_capacity.get());
        let dispatcher = Self {
            config,
            registry: Registry::new(),
            events: rx,
            ingress: tx.downgrade(),
            lifecycle,
        };
        (dispatcher, tx)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Subscribes to participant lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    /// Processes events until the ingress closes.
    pub async fn run(self) -> Self {
        self.run_until(std::future::pending()).await
    }

    /// Processes events until the ingress closes or `shutdown` resolves.
    ///
    /// On exit every remaining participant is removed with
    /// [`RemovalReason::Shutdown`].  The dispatcher is handed back so the
    /// caller can inspect the final state.
    pub async fn run_until<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("dispatcher shutdown requested");
                    None
                }
                event = self.events.recv() => {
                    if event.is_none() {
                        debug!("ingress closed");
                    }
                    event
                }
            };

            let Some(event) = next else { break };
            self.handle(event);
        }

        self.remove_all(RemovalReason::Shutdown);
        self
    }

    /// Applies one event.  Never blocks.
    pub fn handle(&mut self, event: Event) {
        trace!(event = event.name(), "dispatching");
        match event {
            Event::AddClient(connection) => self.add_client(connection),
            Event::RemoveClient { id, reason } => self.remove_client(id, reason),
            Event::Broadcast { sender, payload } => self.broadcast(sender, payload),
        }
    }

    fn add_client(&mut self, connection: Connection) {
        let Some(ingress) = self.ingress.upgrade() else {
            warn!(peer = %connection.peer(), "dispatcher is stopping; refusing client");
            connection.handle().close();
            return;
        };

        let ConnectionParts {
            id,
            peer,
            source,
            sink,
            handle,
        } = connection.into_parts();

        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity.get());
        let participant = Participant::new(peer.clone(), queue_tx, handle.clone());
        if let Some(stale) = self.registry.insert(id, participant) {
            warn!(%id, "connection id reused while still registered; closing stale entry");
            stale.retire();
        }

        let reader = ConnectionReader::new(
            id,
            peer.clone(),
            source,
            handle.clone(),
            ingress.clone(),
        );
        let writer = ConnectionWriter::new(id, peer.clone(), sink, queue_rx, handle, ingress);
        tokio::spawn(reader.run());
        tokio::spawn(writer.run());

        info!(%id, %peer, participants = self.registry.len(), "AddClient");
        self.publish(LifecycleEvent::Joined { id, peer });
    }

    fn remove_client(&mut self, id: ConnectionId, reason: RemovalReason) {
        let Some(participant) = self.registry.remove(id) else {
            debug!(%id, %reason, "RemoveClient for unknown client ignored");
            return;
        };

        let peer = participant.retire();
        info!(%id, %peer, %reason, participants = self.registry.len(), "RemoveClient");
        self.publish(LifecycleEvent::Left { id, peer, reason });
    }

    fn broadcast(&mut self, sender: ConnectionId, payload: Bytes) {
        let outcome = self.registry.fan_out(sender, &payload);
        debug!(
            %sender,
            bytes = payload.len(),
            delivered = outcome.delivered,
            skipped = outcome.closed.len(),
            "Broadcast"
        );

        if !outcome.has_casualties() {
            return;
        }

        // Evict only after the scan has finished.  Closed queues are left to
        // the RemoveClient their reader or writer has already sent.
        for id in outcome.overflowed {
            self.remove_client(id, RemovalReason::Backpressure);
        }
    }

    fn remove_all(&mut self, reason: RemovalReason) {
        let ids: Vec<ConnectionId> = self.registry.ids().collect();
        for id in ids {
            self.remove_client(id, reason);
        }
    }

    fn publish(&self, event: LifecycleEvent) {
        // No subscribers is fine; lagging ones skip ahead on their own.
        let _ = self.lifecycle.send(event);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
