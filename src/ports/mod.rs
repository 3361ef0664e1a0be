//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application services and the outside world. Adapters implement
//! these ports.
//!
//! - `SchemaRegistry` - Resolves schema identifiers to documents
//! - `SchemaValidator` - Validates payloads against resolved documents
//! - `EventPublisher` - Puts envelopes on an event bus
//! - `MessageQueue` - Polls and acknowledges queue messages
//! - `MessageHandler` - User logic invoked per consumed message

mod event_publisher;
mod message_handler;
mod message_queue;
mod schema_registry;
mod schema_validator;

pub use event_publisher::{EventPublisher, PublishError};
pub use message_handler::{FnHandler, HandlerError, MessageHandler};
pub use message_queue::{MessageQueue, QueueError};
pub use schema_registry::{RegistryError, SchemaRegistry};
pub use schema_validator::{SchemaValidationError, SchemaValidator};
