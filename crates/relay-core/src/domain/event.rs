//! Events consumed by the dispatcher and lifecycle notifications it emits.

use std::fmt;

use bytes::Bytes;

use super::connection::{Connection, ConnectionId};

/// An instruction for the dispatcher.
///
/// The set is closed: the dispatcher matches it exhaustively, so an
/// unrecognised event cannot reach it.  Every event is consumed exactly once,
/// in the order it arrived on the dispatcher's ingress channel.
#[derive(Debug)]
pub enum Event {
    /// A freshly accepted connection wants to join.
    AddClient(Connection),
    /// A connection must leave.  Processing is idempotent.
    RemoveClient {
        id: ConnectionId,
        reason: RemovalReason,
    },
    /// `payload` must reach every participant except `sender`.
    Broadcast {
        sender: ConnectionId,
        payload: Bytes,
    },
}

impl Event {
    /// Short variant name for log lines.  Never includes the payload.
    pub fn name(&self) -> &'static str {
        match self {
            Event::AddClient(_) => "AddClient",
            Event::RemoveClient { .. } => "RemoveClient",
            Event::Broadcast { .. } => "Broadcast",
        }
    }
}

/// Why a participant was removed.
///
/// Purely diagnostic: every reason is handled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The reader's transport failed or the peer hung up.
    ReadFailed,
    /// The peer sent a non-binary frame.
    ProtocolViolation,
    /// The writer's transport failed.
    WriteFailed,
    /// The participant's outbound queue overflowed during a broadcast.
    Backpressure,
    /// The dispatcher is shutting down.
    Shutdown,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RemovalReason::ReadFailed => "read failed",
            RemovalReason::ProtocolViolation => "protocol violation",
            RemovalReason::WriteFailed => "write failed",
            RemovalReason::Backpressure => "too slow",
            RemovalReason::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

/// Participant lifecycle notification published by the dispatcher.
///
/// Exactly one `Joined` and at most one `Left` is published per connection,
/// no matter how many removal requests were raised for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Joined {
        id: ConnectionId,
        peer: String,
    },
    Left {
        id: ConnectionId,
        peer: String,
        reason: RemovalReason,
    },
}

impl LifecycleEvent {
    pub fn id(&self) -> ConnectionId {
        match self {
            LifecycleEvent::Joined { id, .. } | LifecycleEvent::Left { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_does_not_expose_payload() {
        let event = Event::Broadcast {
            sender: ConnectionId::new(),
            payload: Bytes::from_static(b"secret"),
        };
        assert_eq!(event.name(), "Broadcast");
    }

    #[test]
    fn test_remove_client_name() {
        let event = Event::RemoveClient {
            id: ConnectionId::new(),
            reason: RemovalReason::ReadFailed,
        };
        assert_eq!(event.name(), "RemoveClient");
    }

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::Backpressure.to_string(), "too slow");
        assert_eq!(RemovalReason::ProtocolViolation.to_string(), "protocol violation");
    }

    #[test]
    fn test_lifecycle_event_id() {
        let id = ConnectionId::new();
        let joined = LifecycleEvent::Joined {
            id,
            peer: "127.0.0.1:1".into(),
        };
        let left = LifecycleEvent::Left {
            id,
            peer: "127.0.0.1:1".into(),
            reason: RemovalReason::Shutdown,
        };
        assert_eq!(joined.id(), id);
        assert_eq!(left.id(), id);
    }
}
