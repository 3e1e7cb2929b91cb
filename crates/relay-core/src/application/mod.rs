//! Application layer for relay-core.
//!
//! - **`dispatcher`** – drains the ingress event stream, owns the registry,
//!   applies the eviction policy, and spawns per-connection tasks.
//! - **`registry`** – participant map and the non-blocking fan-out pass.
//! - **`reader`** / **`writer`** – the two tasks that run per connection.
//!
//! The reader and writer talk to the dispatcher only through events; the
//! dispatcher talks to the writer only through its outbound queue.

pub mod dispatcher;
pub mod reader;
pub mod registry;
pub mod writer;

pub use dispatcher::Dispatcher;
pub use registry::{FanOut, Participant, Registry};
