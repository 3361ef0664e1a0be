//! Domain layer - value types shared by the producer and the consumer.
//!
//! Nothing in here performs I/O; registries, buses and queues are reached
//! through the traits in [`crate::ports`].

pub mod event;
pub mod foundation;
pub mod message;
pub mod schema;
