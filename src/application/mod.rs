//! Application layer - producer and consumer orchestration.
//!
//! Coordinates the ports: schema resolution, validation, publishing and
//! queue polling. Adapters are injected at construction.

mod consumer;
mod errors;
mod producer;

pub use consumer::{BatchReport, ConsumerHandle, EventConsumer, EventConsumerConfig};
pub use errors::ClientError;
pub use producer::{EventProducer, ProduceRequest};
