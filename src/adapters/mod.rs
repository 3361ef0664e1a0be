//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `registry` - schema registries (Apicurio HTTP, EventBridge Schemas)
//! - `validation` - JSON Schema validation
//! - `eventbridge` - event bus publishing
//! - `sqs` - queue polling and deletion
//! - `memory` - in-memory bus and queue for tests and offline runs

pub mod aws;
pub mod eventbridge;
pub mod memory;
pub mod registry;
pub mod sqs;
pub mod validation;

pub use eventbridge::EventBridgePublisher;
pub use memory::{InMemoryEventBus, InMemoryQueue};
pub use registry::{
    connect_registry, CachingSchemaRegistry, CloudSchemaRegistry, HttpSchemaRegistry,
    InMemorySchemaRegistry,
};
pub use sqs::SqsQueue;
pub use validation::JsonSchemaValidator;
