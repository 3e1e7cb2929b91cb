//! Relay core configuration.
//!
//! [`RelayConfig`] is a plain struct with no I/O.  The server crate fills it
//! from a TOML file and CLI flags; tests build it directly, usually with a
//! small queue capacity to make eviction easy to trigger.

use std::num::NonZeroUsize;

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("capacity must be non-zero"),
    }
}

/// Default per-connection outbound queue capacity (K).
///
/// Deliberately small: a participant more than five messages behind is
/// considered stalled and is evicted.
pub const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = non_zero(5);

/// Default capacity of the dispatcher's ingress channel.
pub const DEFAULT_INGRESS_CAPACITY: NonZeroUsize = non_zero(64);

/// Default number of lifecycle notifications buffered per observer.
pub const DEFAULT_LIFECYCLE_CAPACITY: NonZeroUsize = non_zero(64);

/// Runtime configuration for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Capacity K of every participant's outbound queue.
    pub queue_capacity: NonZeroUsize,

    /// Capacity of the multi-producer ingress channel feeding the dispatcher.
    ///
    /// When it is full, readers wait before emitting further broadcasts.  The
    /// dispatcher itself never sends into it.
    pub ingress_capacity: NonZeroUsize,

    /// Buffer of the lifecycle broadcast channel.  Observers that fall
    /// further behind skip notifications; the dispatcher never waits for them.
    pub lifecycle_capacity: NonZeroUsize,
}

impl RelayConfig {
    /// Default configuration with a custom queue capacity.
    pub fn with_queue_capacity(queue_capacity: NonZeroUsize) -> Self {
        Self {
            queue_capacity,
            ..Self::default()
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            lifecycle_capacity: DEFAULT_LIFECYCLE_CAPACITY,
        }
    }
}
