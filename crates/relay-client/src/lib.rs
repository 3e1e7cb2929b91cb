//! relay-client library crate.
//!
//! A line-oriented terminal client for the fanout relay:
//!
//! - every line read from the input is sent as one binary message;
//! - every binary message received is written to the output as one line.
//!
//! With a non-zero [`ClientConfig::read_delay`] the client pauses after each
//! received message, which makes it fall behind a busy relay.  That is the
//! easiest way to watch the relay's slow-client eviction from a terminal.
//!
//! The session is modelled as two halves racing each other: the first one to
//! finish ends the session, as reported by [`SessionEnd`].

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default relay endpoint.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8000/ws";

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket URL of the relay.
    pub url: String,

    /// Pause after each received message.
    pub read_delay: Duration,

    /// Never read input; only print what arrives.
    pub listen_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            read_delay: Duration::ZERO,
            listen_only: false,
        }
    }
}

// ── Errors and outcome ────────────────────────────────────────────────────────

/// Error type for a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: WsError,
    },

    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// The relay only ever sends binary messages.
    #[error("received a text message, expected binary")]
    UnexpectedText,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which side ended a session that finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The input reached end of file.
    InputClosed,
    /// The relay closed the connection.
    ServerClosed,
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Connects to the relay and runs one session until either side ends.
///
/// # Errors
///
/// Returns [`ClientError::Connect`] if the relay cannot be reached, and other
/// variants for failures during the session.
pub async fn run<I, O>(config: &ClientConfig, input: I, output: O) -> Result<SessionEnd, ClientError>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (stream, _response) =
        connect_async(config.url.as_str())
            .await
            .map_err(|source| ClientError::Connect {
                url: config.url.clone(),
                source,
            })?;
    info!(url = %config.url, "connected");

    let (sink, source) = stream.split();

    let send = async {
        if config.listen_only {
            std::future::pending::<()>().await;
        }
        send_lines(input, sink).await
    };
    let receive = receive_messages(source, output, config.read_delay);

    tokio::select! {
        result = send => result,
        result = receive => result,
    }
}

/// Sends each input line as one binary message.  On end of input the
/// connection is closed gracefully.
async fn send_lines<I>(
    input: I,
    mut sink: SplitSink<WsStream, Message>,
) -> Result<SessionEnd, ClientError>
where
    I: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        sink.send(Message::Binary(line.into_bytes())).await?;
    }

    debug!("input closed; closing connection");
    // The relay may already be gone; the session is over either way.
    let _ = sink.close().await;
    Ok(SessionEnd::InputClosed)
}

/// Writes each received binary message to `output` as one line.
async fn receive_messages<O>(
    mut source: SplitStream<WsStream>,
    mut output: O,
    read_delay: Duration,
) -> Result<SessionEnd, ClientError>
where
    O: AsyncWrite + Unpin,
{
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Binary(payload)) => {
                output.write_all(&render_line(&payload)).await?;
                output.flush().await?;
                if !read_delay.is_zero() {
                    debug!(bytes = payload.len(), "received; sleeping {read_delay:?}");
                    tokio::time::sleep(read_delay).await;
                }
            }
            Ok(Message::Text(_)) => return Err(ClientError::UnexpectedText),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            // The relay drops evicted clients without a closing handshake.
            Err(
                WsError::ConnectionClosed
                | WsError::AlreadyClosed
                | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake),
            ) => break,
            Err(e) => return Err(e.into()),
        }
    }

    debug!("relay closed the connection");
    Ok(SessionEnd::ServerClosed)
}

/// One output line for a received payload.  Invalid UTF-8 is replaced, so
/// arbitrary binary payloads never break the terminal.
fn render_line(payload: &[u8]) -> Vec<u8> {
    let mut line = String::from_utf8_lossy(payload).into_owned().into_bytes();
    line.push(b'\n');
    line
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_local_relay() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.url, "ws://127.0.0.1:8000/ws");
        assert_eq!(cfg.read_delay, Duration::ZERO);
        assert!(!cfg.listen_only);
    }

    #[test]
    fn test_render_line_appends_newline() {
        assert_eq!(render_line(b"hello"), b"hello\n");
    }

    #[test]
    fn test_render_line_replaces_invalid_utf8() {
        // Arrange: 0xff is never valid UTF-8
        let payload = [b'a', 0xff, b'b'];

        // Act
        let line = render_line(&payload);

        // Assert
        assert_eq!(String::from_utf8(line).unwrap(), "a\u{fffd}b\n");
    }

    #[tokio::test]
    async fn test_connect_failure_names_url() {
        // Arrange: nothing listens on port 1
        let config = ClientConfig {
            url: "ws://127.0.0.1:1/ws".to_string(),
            ..ClientConfig::default()
        };

        // Act
        let result = run(&config, tokio::io::empty(), tokio::io::sink()).await;

        // Assert
        match result {
            Err(err @ ClientError::Connect { .. }) => {
                assert!(err.to_string().contains("ws://127.0.0.1:1/ws"))
            }
            other => panic!("expected a connect error, got {other:?}"),
        }
    }
}
