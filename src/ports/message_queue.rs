//! MessageQueue port - Interface for polling and acknowledging messages.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::foundation::ReceiptHandle;
use crate::domain::message::RawMessage;

/// Port for a visibility-timeout queue (SQS semantics).
///
/// Implementations must:
/// - Hide received messages until they are deleted or their visibility
///   timeout lapses, then make them receivable again
/// - Return an empty batch, not an error, when nothing is available
/// - Never delete a message except through `delete`
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Receive up to `max_messages`, waiting at most `wait_time` for the
    /// first one to arrive.
    async fn receive(
        &self,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, QueueError>;

    /// Acknowledge a delivery, removing the message from the queue.
    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<(), QueueError>;
}

/// Errors from queue operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Invalid AWS credentials: {0}")]
    InvalidCredentials(String),

    #[error("Failed to receive messages: {0}")]
    Receive(String),

    #[error("Failed to delete message: {0}")]
    Delete(String),

    #[error("Receipt handle is not current: {0}")]
    StaleReceipt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn MessageQueue) {}

    #[test]
    fn invalid_credentials_message_is_recognisable() {
        let err = QueueError::InvalidCredentials("InvalidClientTokenId".to_string());
        assert!(err.to_string().contains("Invalid AWS credentials"));
    }
}
