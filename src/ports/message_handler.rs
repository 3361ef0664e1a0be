//! MessageHandler port - User processing logic invoked per message.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::message::InboundMessage;

/// Handler for processing validated messages.
///
/// Implementations should be:
/// - **Idempotent** - delivery is at-least-once, duplicates happen
/// - **Stateless with respect to the consumer** - everything needed is on
///   the message
///
/// Returning `Ok` lets the consumer commit the message; any error leaves it
/// in the queue for redelivery.
///
/// # Example
///
/// ```ignore
/// struct ThumbnailGenerator;
///
/// #[async_trait]
/// impl MessageHandler for ThumbnailGenerator {
///     async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
///         let event: FileUploaded = message.payload_as().map_err(HandlerError::failed)?;
///         // ...
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "ThumbnailGenerator"
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message.
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Errors surfaced by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(reason: impl ToString) -> Self {
        HandlerError::Failed(reason.to_string())
    }
}

/// Adapts a synchronous closure into a `MessageHandler`.
///
/// ```ignore
/// let handler = FnHandler::new("print", |msg: &InboundMessage| {
///     println!("{}", msg.payload());
///     Ok(())
/// });
/// ```
pub struct FnHandler<F> {
    name: &'static str,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&InboundMessage) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&InboundMessage) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        (self.func)(message)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::RawMessage;
    use crate::domain::schema::{RegistryLocation, SchemaDocument, SchemaId, SchemaReference};
    use serde_json::json;
    use std::sync::Arc;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn MessageHandler) {}

    fn message() -> InboundMessage {
        let reference = SchemaReference::new(
            RegistryLocation::Url {
                base_url: "http://registry.local".to_string(),
                group: "default".to_string(),
            },
            SchemaId::parse("Any").unwrap(),
        );
        let schema = Arc::new(SchemaDocument::from_value(reference, json!({})).unwrap());
        InboundMessage::new(RawMessage::new("m-1", "rh-1", "{}"), schema)
    }

    #[tokio::test]
    async fn fn_handler_invokes_closure() {
        let handler = FnHandler::new("ok", |msg: &InboundMessage| {
            assert_eq!(msg.message_id().as_str(), "m-1");
            Ok(())
        });
        assert_eq!(handler.name(), "ok");
        assert!(handler.handle(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn fn_handler_propagates_errors() {
        let handler = FnHandler::new("fails", |_: &InboundMessage| {
            Err(HandlerError::failed("downstream unavailable"))
        });
        assert_eq!(
            handler.handle(&message()).await,
            Err(HandlerError::Failed("downstream unavailable".to_string()))
        );
    }
}
