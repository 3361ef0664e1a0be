//! Client-facing error taxonomy.
//!
//! Every port error converts into `ClientError`, so producer and consumer
//! calls surface one error type with a stable [`ErrorCode`].

use thiserror::Error;

use crate::domain::foundation::{ErrorCode, ValidationError};
use crate::ports::{HandlerError, PublishError, QueueError, RegistryError, SchemaValidationError};

/// Errors returned by `EventProducer` and `EventConsumer`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Schema not found: {schema_id}")]
    SchemaNotFound { schema_id: String },

    #[error("Schema registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Invalid schema '{schema_id}': {reason}")]
    InvalidSchema { schema_id: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(ValidationError),

    #[error("Payload failed schema validation: {0}")]
    Validation(#[from] SchemaValidationError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Poll failed: {0}")]
    Poll(QueueError),

    #[error("Commit failed: {0}")]
    Commit(QueueError),

    #[error("Malformed message {message_id}: {reason}")]
    MalformedMessage { message_id: String, reason: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("Invalid message state: {0}")]
    InvalidState(ValidationError),
}

impl ClientError {
    /// Stable machine-readable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::SchemaNotFound { .. } => ErrorCode::SchemaNotFound,
            ClientError::RegistryUnavailable(_) => ErrorCode::RegistryUnavailable,
            ClientError::InvalidSchema { .. } => ErrorCode::InvalidSchema,
            ClientError::Configuration(_) => ErrorCode::InvalidConfiguration,
            ClientError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ClientError::Validation(_) => ErrorCode::ValidationFailed,
            ClientError::Publish(_) => ErrorCode::PublishFailed,
            ClientError::Poll(_) => ErrorCode::PollFailed,
            ClientError::Commit(_) => ErrorCode::CommitFailed,
            ClientError::MalformedMessage { .. } => ErrorCode::MalformedMessage,
            ClientError::Handler(_) => ErrorCode::HandlerFailed,
            ClientError::InvalidState(_) => ErrorCode::InvalidState,
        }
    }

    /// True for failures that may succeed when retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::RegistryUnavailable(_)
                | ClientError::Publish(PublishError::Transport(_))
                | ClientError::Poll(QueueError::Receive(_))
                | ClientError::Commit(QueueError::Delete(_))
        )
    }

    /// Fields violated by the payload, empty for other errors.
    pub fn violated_fields(&self) -> Vec<&str> {
        match self {
            ClientError::Validation(e) => e.fields(),
            _ => Vec::new(),
        }
    }
}

impl From<RegistryError> for ClientError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SchemaNotFound { schema_id } => ClientError::SchemaNotFound { schema_id },
            RegistryError::Unavailable(reason) => ClientError::RegistryUnavailable(reason),
            RegistryError::InvalidSchema { schema_id, reason } => {
                ClientError::InvalidSchema { schema_id, reason }
            }
            RegistryError::Misconfigured(reason) => ClientError::Configuration(reason),
        }
    }
}

impl From<QueueError> for ClientError {
    fn from(err: QueueError) -> Self {
        ClientError::Poll(err)
    }
}
