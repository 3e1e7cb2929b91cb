//! WebSocket-backed [`Connection`].
//!
//! After the handshake the stream is split into independently owned halves:
//! the read half becomes the connection's [`FrameSource`], the write half its
//! [`FrameSink`].  The relay's reader and writer tasks each own one, so reads
//! and writes never contend for a lock.
//!
//! # Frame mapping
//!
//! | WebSocket message     | Relay view                        |
//! |-----------------------|-----------------------------------|
//! | Binary                | `Frame::Binary`                   |
//! | Text                  | `Frame::Other(Text)`              |
//! | Raw frame             | `Frame::Other(Raw)`               |
//! | Ping / Pong           | skipped (answered by tungstenite) |
//! | Close, end of stream  | `TransportError::Closed`          |
//!
//! Dropping both halves drops the TCP stream, which is how a force-closed
//! session is torn down.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_core::{Connection, Frame, FrameKind, FrameSink, FrameSource, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tracing::trace;

/// Read half of a WebSocket session.
pub struct WsSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Write half of a WebSocket session.
pub struct WsSink<S> {
    inner: SplitSink<WebSocketStream<S>, WsMessage>,
}

/// Wraps an established WebSocket stream as a relay [`Connection`].
pub fn into_connection<S>(stream: WebSocketStream<S>, peer: impl Into<String>) -> Connection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, source) = stream.split();
    Connection::new(peer, WsSource { inner: source }, WsSink { inner: sink })
}

/// Maps a tungstenite error into the transport-neutral error type.
fn map_ws_error(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        WsError::Io(e) => TransportError::Io(e),
        other => TransportError::WebSocket(other.to_string()),
    }
}

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            let message = match self.inner.next().await {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Err(map_ws_error(err)),
                None => return Err(TransportError::Closed),
            };

            return match message {
                WsMessage::Binary(data) => Ok(Frame::Binary(Bytes::from(data))),
                WsMessage::Text(_) => Ok(Frame::Other(FrameKind::Text)),
                WsMessage::Frame(_) => Ok(Frame::Other(FrameKind::Raw)),
                WsMessage::Close(_) => Err(TransportError::Closed),
                WsMessage::Ping(_) | WsMessage::Pong(_) => {
                    trace!("WebSocket control frame skipped");
                    continue;
                }
            };
        }
    }
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_binary(&mut self, payload: Bytes) -> Result<(), TransportError> {
        // `send` flushes, so a payload is on the wire once this returns.
        self.inner
            .send(WsMessage::Binary(payload.to_vec()))
            .await
            .map_err(map_ws_error)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
