//! WebSocket server: accept loop and dispatcher lifetime.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Running the relay-core dispatcher for as long as the server runs.
//! 3. Accepting connections and upgrading each one to a WebSocket session in
//!    its own task, so a slow handshake never delays the next accept.
//! 4. Submitting every upgraded session to the dispatcher as `AddClient`.
//! 5. Logging participant lifecycle notifications.
//! 6. Shutting down: stop accepting, then stop the dispatcher, which closes
//!    every remaining session.
//!
//! The request path is not inspected; clients conventionally connect to
//! `ws://host:port/ws`.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use relay_core::{Dispatcher, Event, LifecycleEvent};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::ServerConfig;
use crate::infrastructure::ws_conn;

/// Back-off after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound, not yet running relay server.
pub struct RelayServer {
    listener: TcpListener,
    config: ServerConfig,
    dispatcher: Dispatcher,
    ingress: mpsc::Sender<Event>,
}

impl RelayServer {
    /// Binds the listener and creates the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound (e.g., the port is
    /// already in use or the process lacks permission to bind).
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind relay listener on {}", config.bind_addr))?;
        let (dispatcher, ingress) = Dispatcher::new(config.relay);

        Ok(Self {
            listener,
            config,
            dispatcher,
            ingress,
        })
    }

    /// The address actually bound; differs from the configured one when the
    /// configured port was 0.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Subscribes to participant lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.dispatcher.subscribe()
    }

    /// Accepts connections until `shutdown` resolves, then stops the
    /// dispatcher and waits for it to remove every participant.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher task panicked.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            listener,
            config,
            dispatcher,
            ingress,
        } = self;

        let local_addr = listener.local_addr().ok();
        info!(
            addr = ?local_addr,
            queue_capacity = config.relay.queue_capacity.get(),
            "relay listening"
        );

        let lifecycle_task = tokio::spawn(log_lifecycle(dispatcher.subscribe()));
        let stop = CancellationToken::new();
        let dispatcher_task = tokio::spawn({
            let stop = stop.clone();
            dispatcher.run_until(async move { stop.cancelled().await })
        });

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("shutdown requested; stopping accept loop");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        debug!(%peer_addr, "TCP connection accepted");
                        tokio::spawn(admit(
                            stream,
                            peer_addr,
                            config.handshake_timeout,
                            ingress.clone(),
                        ));
                    }
                    Err(e) => {
                        // Transient accept error; keep serving everyone else.
                        error!("accept error: {e}");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        stop.cancel();
        let dispatcher = dispatcher_task
            .await
            .context("dispatcher task failed")?;
        drop(dispatcher);
        drop(ingress);

        // The lifecycle channel closes with the dispatcher.
        if let Err(e) = lifecycle_task.await {
            warn!("lifecycle logger failed: {e}");
        }

        info!("relay stopped");
        Ok(())
    }
}

/// Binds and runs a relay server until `shutdown` resolves.
///
/// # Errors
///
/// See [`RelayServer::bind`] and [`RelayServer::run_until`].
pub async fn run_server<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    RelayServer::bind(config).await?.run_until(shutdown).await
}

// ── Per-connection admission ──────────────────────────────────────────────────

/// Completes the WebSocket handshake and hands the session to the dispatcher.
///
/// Handshake failures only affect this connection; they are logged and the
/// stream is dropped.
async fn admit(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handshake_timeout: Duration,
    ingress: mpsc::Sender<Event>,
) {
    let ws_stream = match timeout(handshake_timeout, accept_async(stream)).await {
        Ok(Ok(ws_stream)) => ws_stream,
        Ok(Err(e)) => {
            warn!(%peer_addr, "WebSocket handshake failed: {e}");
            return;
        }
        Err(_) => {
            warn!(%peer_addr, "WebSocket handshake timed out after {handshake_timeout:?}");
            return;
        }
    };

    let connection = ws_conn::into_connection(ws_stream, peer_addr.to_string());
    debug!(%peer_addr, id = %connection.id(), "WebSocket session established");

    if ingress.send(Event::AddClient(connection)).await.is_err() {
        // Dropping the rejected connection closes the socket.
        debug!(%peer_addr, "dispatcher stopped; session dropped");
    }
}

// ── Lifecycle log ─────────────────────────────────────────────────────────────

/// Logs joins and departures with a running participant count.
async fn log_lifecycle(mut events: broadcast::Receiver<LifecycleEvent>) {
    let mut online: usize = 0;
    loop {
        match events.recv().await {
            Ok(LifecycleEvent::Joined { id, peer }) => {
                online += 1;
                info!(%id, %peer, online, "client joined");
            }
            Ok(LifecycleEvent::Left { id, peer, reason }) => {
                online = online.saturating_sub(1);
                info!(%id, %peer, %reason, online, "client left");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "lifecycle log fell behind; count may be off");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
