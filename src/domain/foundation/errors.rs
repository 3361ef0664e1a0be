//! Error types for the domain layer.

use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction and state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid state transition error.
    pub fn invalid_transition(from: impl fmt::Debug, to: impl fmt::Debug) -> Self {
        ValidationError::InvalidTransition {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}

/// Stable machine-readable error codes, one per failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Registry errors
    SchemaNotFound,
    RegistryUnavailable,
    InvalidSchema,
    InvalidConfiguration,

    // Payload errors
    InvalidRequest,
    ValidationFailed,
    MalformedMessage,

    // Transport errors
    PublishFailed,
    PollFailed,
    CommitFailed,

    // Processing errors
    HandlerFailed,
    InvalidState,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::SchemaNotFound => "SCHEMA_NOT_FOUND",
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::InvalidSchema => "INVALID_SCHEMA",
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::MalformedMessage => "MALFORMED_MESSAGE",
            ErrorCode::PublishFailed => "PUBLISH_FAILED",
            ErrorCode::PollFailed => "POLL_FAILED",
            ErrorCode::CommitFailed => "COMMIT_FAILED",
            ErrorCode::HandlerFailed => "HANDLER_FAILED",
            ErrorCode::InvalidState => "INVALID_STATE",
        };
        write!(f, "{}", s)
    }
}
