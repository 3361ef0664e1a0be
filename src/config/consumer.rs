//! Queue consumer configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::schema::SchemaId;

/// Largest batch a single receive call may request.
pub const MAX_BATCH_SIZE: u32 = 10;

/// Longest long-poll wait the queue supports.
pub const MAX_WAIT_TIME_SECS: u64 = 20;

/// Queue consumer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// URL of the queue to poll
    pub queue_url: String,

    /// Schema every message is validated against
    pub schema_name: String,

    /// Pause between poll iterations in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Messages requested per poll
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,

    /// Long-poll wait per receive call in seconds
    #[serde(default = "default_wait_time")]
    pub wait_time_secs: u64,

    /// Visibility timeout override in seconds (queue default when unset)
    pub visibility_timeout_secs: Option<u32>,

    /// Upper bound on one handler invocation in seconds
    pub processing_timeout_secs: Option<u64>,

    /// Receive count from which deliveries are logged as suspicious
    pub warn_receive_count: Option<u32>,
}

impl ConsumerConfig {
    /// Consumer for `queue_url` validating against `schema_name`, with
    /// defaults for everything else.
    pub fn new(queue_url: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            schema_name: schema_name.into(),
            poll_interval_secs: default_poll_interval(),
            max_messages: default_max_messages(),
            wait_time_secs: default_wait_time(),
            visibility_timeout_secs: None,
            processing_timeout_secs: None,
            warn_receive_count: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    pub fn processing_timeout(&self) -> Option<Duration> {
        self.processing_timeout_secs.map(Duration::from_secs)
    }

    /// Validate consumer configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.queue_url.trim().is_empty() {
            return Err(ValidationError::MissingRequired("CONSUMER_QUEUE_URL"));
        }
        if self.schema_name.trim().is_empty() {
            return Err(ValidationError::MissingRequired("CONSUMER_SCHEMA_NAME"));
        }
        SchemaId::parse(&self.schema_name)
            .map_err(|e| ValidationError::InvalidSchemaName(e.to_string()))?;
        if self.max_messages == 0 || self.max_messages > MAX_BATCH_SIZE {
            return Err(ValidationError::InvalidMaxMessages(self.max_messages));
        }
        if self.wait_time_secs > MAX_WAIT_TIME_SECS {
            return Err(ValidationError::InvalidWaitTime(self.wait_time_secs));
        }
        if self.processing_timeout_secs == Some(0) {
            return Err(ValidationError::InvalidProcessingTimeout);
        }
        Ok(())
    }
}

fn default_poll_interval() -> u64 {
    1
}

fn default_max_messages() -> u32 {
    MAX_BATCH_SIZE
}

fn default_wait_time() -> u64 {
    1
}
