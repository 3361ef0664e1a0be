//! EventBridge Client - schema-validated event production and consumption
//!
//! Producers validate event details against a schema registry before putting
//! them on an event bus. Consumers poll a queue, validate each message
//! against the same registry, hand it to a handler and delete it only after
//! the handler succeeded.
//!
//! The registry backend (Apicurio-compatible HTTP or AWS EventBridge Schemas)
//! is chosen by configuration; buses, queues and registries all sit behind
//! ports so tests run against in-memory adapters.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

pub use application::{
    BatchReport, ClientError, ConsumerHandle, EventConsumer, EventConsumerConfig, EventProducer,
    ProduceRequest,
};
