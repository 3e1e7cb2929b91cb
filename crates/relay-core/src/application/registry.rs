//! Registry of connected participants and the fan-out pass.
//!
//! The registry maps each [`ConnectionId`] to its [`Participant`]: the
//! producer end of that connection's bounded outbound queue plus the handle
//! used to force-close it.  It is owned by the dispatcher and mutated only
//! from the dispatcher's task, so it needs no lock.
//!
//! # Two-phase broadcast (for beginners)
//!
//! [`Registry::fan_out`] takes `&self`: it can enqueue into queues but cannot
//! insert or remove entries.  Participants whose queue is full are only
//! *reported* back to the caller, who evicts them after the scan.  The borrow
//! checker therefore guarantees the map is never mutated mid-iteration.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::domain::{ConnectionHandle, ConnectionId};

/// Registry entry for one connected participant.
#[derive(Debug)]
pub struct Participant {
    peer: String,
    queue: mpsc::Sender<Bytes>,
    handle: ConnectionHandle,
}

impl Participant {
    pub fn new(peer: impl Into<String>, queue: mpsc::Sender<Bytes>, handle: ConnectionHandle) -> Self {
        Self {
            peer: peer.into(),
            queue,
            handle,
        }
    }

    /// Tears the participant down and returns its peer description.
    ///
    /// Dropping the queue producer closes the queue (the writer's stop
    /// signal); closing the handle unblocks a reader stuck on a read.
    pub fn retire(self) -> String {
        let Participant {
            peer,
            queue,
            handle,
        } = self;
        drop(queue);
        handle.close();
        peer
    }
}

/// Result of one fan-out pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Number of queues the payload was appended to.
    pub delivered: usize,
    /// Recipients whose queue was full.
    pub overflowed: Vec<ConnectionId>,
    /// Recipients whose writer had already exited (queue receiver dropped).
    /// Their removal, with its real cause, is already queued on the ingress.
    pub closed: Vec<ConnectionId>,
}

impl FanOut {
    /// Whether any recipient must be evicted after the pass.
    pub fn has_casualties(&self) -> bool {
        !self.overflowed.is_empty()
    }
}

/// The set of participants currently eligible to receive broadcasts.
#[derive(Debug, Default)]
pub struct Registry {
    participants: HashMap<ConnectionId, Participant>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a participant, returning any entry previously stored under
    /// the same id.
    pub fn insert(&mut self, id: ConnectionId, participant: Participant) -> Option<Participant> {
        self.participants.insert(id, participant)
    }

    /// Removes a participant.  Returns `None` if it was not registered, which
    /// makes repeated removals harmless.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Participant> {
        self.participants.remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Ids of every registered participant, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.participants.keys().copied()
    }

    /// Offers `payload` to every participant except `sender`, never waiting.
    ///
    /// A full queue is not retried: the recipient is reported in
    /// [`FanOut::overflowed`] for the caller to evict.
    pub fn fan_out(&self, sender: ConnectionId, payload: &Bytes) -> FanOut {
        let mut outcome = FanOut::default();

        for (id, participant) in &self.participants {
            if *id == sender {
                continue;
            }

            match participant.queue.try_send(payload.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%id, peer = %participant.peer, "client is too slow; marking for eviction");
                    outcome.overflowed.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%id, peer = %participant.peer, "writer already gone; skipping");
                    outcome.closed.push(*id);
                }
            }
        }

        outcome
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
