//! In-memory adapters.
//!
//! Deterministic stand-ins for the event bus and the queue, used by tests
//! and for running producer and consumer together without AWS:
//!
//! - `InMemoryEventBus` - captures published events, optionally forwarding
//!   them to queues
//! - `InMemoryQueue` - visibility timeout, receive counts and dead-letter
//!   redrive

mod event_bus;
mod queue;

pub use event_bus::InMemoryEventBus;
pub use queue::{InMemoryQueue, DEFAULT_VISIBILITY_TIMEOUT};
