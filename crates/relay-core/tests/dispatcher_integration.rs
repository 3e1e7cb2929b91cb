//! End-to-end tests of the dispatcher run loop over the in-memory transport.
//!
//! Unlike the unit tests, these let the spawned reader and writer tasks run:
//! payloads travel peer → reader → dispatcher → queue → writer → peer.

use std::num::NonZeroUsize;
use std::time::Duration;

use bytes::Bytes;
use relay_core::infrastructure::memory::{self, RemotePeer};
use relay_core::{
    ConnectionId, Dispatcher, Event, LifecycleEvent, RelayConfig, RemovalReason,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Relay {
    ingress: mpsc::Sender<Event>,
    lifecycle: broadcast::Receiver<LifecycleEvent>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Dispatcher>,
}

impl Relay {
    fn start(queue_capacity: usize) -> Self {
        let config = RelayConfig::with_queue_capacity(NonZeroUsize::new(queue_capacity).unwrap());
        let (dispatcher, ingress) = Dispatcher::new(config);
        let lifecycle = dispatcher.subscribe();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(dispatcher.run_until(async {
            let _ = stop_rx.await;
        }));
        Self {
            ingress,
            lifecycle,
            stop: Some(stop_tx),
            task,
        }
    }

    /// Connects a new peer and waits until the dispatcher has registered it.
    async fn connect(&mut self, name: &str) -> RemotePeer {
        let (connection, peer) = memory::pair(name, 1);
        self.ingress
            .send(Event::AddClient(connection))
            .await
            .expect("dispatcher running");
        let joined = self.next_lifecycle().await;
        assert_eq!(
            joined,
            LifecycleEvent::Joined {
                id: peer.id(),
                peer: name.to_string()
            }
        );
        peer
    }

    async fn next_lifecycle(&mut self) -> LifecycleEvent {
        timeout(WAIT, self.lifecycle.recv())
            .await
            .expect("lifecycle event in time")
            .expect("lifecycle channel open")
    }

    async fn wait_left(&mut self, id: ConnectionId) -> RemovalReason {
        loop {
            if let LifecycleEvent::Left { id: left, reason, .. } = self.next_lifecycle().await {
                if left == id {
                    return reason;
                }
            }
        }
    }

    async fn shutdown(mut self) -> Dispatcher {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        timeout(WAIT, self.task)
            .await
            .expect("dispatcher stops in time")
            .expect("dispatcher task must not panic")
    }
}

async fn recv(peer: &mut RemotePeer) -> Bytes {
    timeout(WAIT, peer.recv())
        .await
        .expect("payload in time")
        .expect("connection open")
}

/// Asserts that nothing arrives for a short while.
async fn assert_silent(peer: &mut RemotePeer) {
    let result = timeout(Duration::from_millis(100), peer.recv()).await;
    assert!(result.is_err(), "peer unexpectedly received {result:?}");
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_but_sender() {
    // Arrange
    let mut relay = Relay::start(5);
    let mut a = relay.connect("a").await;
    let mut b = relay.connect("b").await;
    let mut c = relay.connect("c").await;

    // Act
    a.send_binary(Bytes::from_static(b"hi")).unwrap();

    // Assert
    assert_eq!(recv(&mut b).await, &b"hi"[..]);
    assert_eq!(recv(&mut c).await, &b"hi"[..]);
    assert_silent(&mut a).await;

    relay.shutdown().await;
}

#[tokio::test]
async fn test_payload_is_relayed_byte_for_byte() {
    let mut relay = Relay::start(5);
    let a = relay.connect("a").await;
    let mut b = relay.connect("b").await;
    let payload: Vec<u8> = (0..=255u8).chain([0, 0, 0xff]).collect();

    a.send_binary(payload.clone()).unwrap();

    assert_eq!(recv(&mut b).await, payload);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_same_sender_order_is_preserved() {
    let mut relay = Relay::start(8);
    let a = relay.connect("a").await;
    let mut b = relay.connect("b").await;

    for n in 0..5 {
        a.send_binary(Bytes::from(format!("{n}"))).unwrap();
    }

    for n in 0..5 {
        assert_eq!(recv(&mut b).await, Bytes::from(format!("{n}")));
    }
    relay.shutdown().await;
}

#[tokio::test]
async fn test_text_frame_disconnects_only_the_offender() {
    // Arrange
    let mut relay = Relay::start(5);
    let a = relay.connect("a").await;
    let mut b = relay.connect("b").await;
    let offender = relay.connect("offender").await;

    // Act
    offender.send_text().unwrap();

    // Assert: removed for the violation, force-closed, nobody saw a payload
    assert_eq!(
        relay.wait_left(offender.id()).await,
        RemovalReason::ProtocolViolation
    );
    timeout(WAIT, offender.closed()).await.unwrap();
    assert_silent(&mut b).await;

    // The others keep talking
    a.send_binary(Bytes::from_static(b"still here")).unwrap();
    assert_eq!(recv(&mut b).await, &b"still here"[..]);

    let dispatcher = relay.shutdown().await;
    assert!(dispatcher.registry().is_empty());
}

#[tokio::test]
async fn test_stalled_peer_is_evicted_and_others_unaffected() {
    // Arrange
    let mut relay = Relay::start(5);
    let a = relay.connect("a").await;
    let mut b = relay.connect("b").await;
    let mut c = relay.connect("c").await;

    a.send_binary(Bytes::from_static(b"hi")).unwrap();
    assert_eq!(recv(&mut b).await, &b"hi"[..]);
    assert_eq!(recv(&mut c).await, &b"hi"[..]);

    // Act: B stops reading; A keeps sending in lock-step with C
    b.stall();
    let mut sent = vec![Bytes::from_static(b"hi")];
    let mut received_by_c = vec![Bytes::from_static(b"hi")];
    for n in 1..=12 {
        let payload = Bytes::from(format!("msg-{n}"));
        a.send_binary(payload.clone()).unwrap();
        sent.push(payload);
        received_by_c.push(recv(&mut c).await);
    }

    // Assert: B evicted for backpressure and force-closed
    assert_eq!(relay.wait_left(b.id()).await, RemovalReason::Backpressure);
    timeout(WAIT, b.closed()).await.unwrap();

    // Assert: C got everything in order, A got none of its own payloads
    assert_eq!(received_by_c, sent);

    let mut a = a;
    assert_silent(&mut a).await;

    let dispatcher = relay.shutdown().await;
    assert!(!dispatcher.registry().contains(b.id()));
}

#[tokio::test]
async fn test_write_failure_removes_client_proactively() {
    // Arrange
    let mut relay = Relay::start(5);
    let a = relay.connect("a").await;
    let mut b = relay.connect("b").await;

    // Act: B can still send but no longer accepts deliveries
    b.stop_receiving();
    a.send_binary(Bytes::from_static(b"lost")).unwrap();

    // Assert: the writer's failure alone is enough to remove B
    assert_eq!(relay.wait_left(b.id()).await, RemovalReason::WriteFailed);
    assert!(b.is_closed());
    relay.shutdown().await;
}

#[tokio::test]
async fn test_peer_hang_up_removes_client() {
    let mut relay = Relay::start(5);
    let _a = relay.connect("a").await;
    let mut b = relay.connect("b").await;

    b.disconnect();

    assert_eq!(relay.wait_left(b.id()).await, RemovalReason::ReadFailed);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_every_participant() {
    let mut relay = Relay::start(5);
    let a = relay.connect("a").await;
    let b = relay.connect("b").await;

    let dispatcher = relay.shutdown().await;

    assert!(dispatcher.registry().is_empty());
    assert!(a.is_closed());
    assert!(b.is_closed());
}
