//! EventPublisher port - Interface for putting events on a bus.
//!
//! This port defines how the producer publishes envelopes without knowing
//! about the underlying transport (EventBridge, in-memory, etc.).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::event::{EventEnvelope, PublishResult};

/// Port for publishing events to a named bus.
///
/// Implementations must:
/// - Publish exactly one entry per call and never retry internally
/// - Return the bus-assigned event id on success
/// - Refuse entries over the bus size limit without a transport call
///
/// # Example
///
/// ```ignore
/// let envelope = EventEnvelope::new("default", "com.example.files", "FileUploaded", detail, "FileUploaded-v0");
/// let result = publisher.publish(&envelope).await?;
/// println!("published {}", result.event_id);
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single envelope.
    async fn publish(&self, envelope: &EventEnvelope) -> Result<PublishResult, PublishError>;
}

/// Errors reported by the bus or its transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("Event bus not found: {bus}")]
    BusNotFound { bus: String },

    #[error("Event entry of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Event rejected by bus ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Event bus transport failure: {0}")]
    Transport(String),
}
