//! EventBridge publisher - puts one entry per envelope.

use async_trait::async_trait;
use aws_sdk_eventbridge::types::PutEventsRequestEntry;
use aws_sdk_eventbridge::Client;
use tracing::{debug, error, warn};

use crate::adapters::aws::{error_chain, error_code, load_sdk_config};
use crate::config::AwsConfig;
use crate::domain::event::{EventEnvelope, PublishResult, MAX_ENTRY_BYTES};
use crate::domain::foundation::EventId;
use crate::ports::{EventPublisher, PublishError};

const BUS_NOT_FOUND: &str = "ResourceNotFoundException";

/// Publishes envelopes with `PutEvents`. Failures are reported as-is;
/// retrying is the caller's decision.
pub struct EventBridgePublisher {
    client: Client,
}

impl EventBridgePublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the SDK client from shared AWS configuration.
    pub async fn connect(aws: &AwsConfig) -> Self {
        let sdk_config = load_sdk_config(aws, None).await;
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl EventPublisher for EventBridgePublisher {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<PublishResult, PublishError> {
        let size = envelope.entry_size();
        if size > MAX_ENTRY_BYTES {
            warn!(
                event_bus = %envelope.event_bus_name,
                size,
                "Event entry exceeds bus size limit"
            );
            return Err(PublishError::PayloadTooLarge {
                size,
                limit: MAX_ENTRY_BYTES,
            });
        }

        let entry = PutEventsRequestEntry::builder()
            .event_bus_name(&envelope.event_bus_name)
            .source(&envelope.source)
            .detail_type(&envelope.detail_type)
            .detail(envelope.serialized_detail())
            .set_trace_header(
                envelope
                    .trace_context
                    .as_ref()
                    .and_then(|context| context.xray_trace_header())
                    .map(str::to_string),
            )
            .build();

        let output = self
            .client
            .put_events()
            .entries(entry)
            .send()
            .await
            .map_err(|err| {
                let message = error_chain(&err);
                if error_code(&err) == Some(BUS_NOT_FOUND) {
                    return PublishError::BusNotFound {
                        bus: envelope.event_bus_name.clone(),
                    };
                }
                error!(event_bus = %envelope.event_bus_name, "PutEvents failed: {}", message);
                PublishError::Transport(message)
            })?;

        let Some(result) = output.entries().first() else {
            return Err(PublishError::Transport(
                "PutEvents returned no entry result".to_string(),
            ));
        };

        if let Some(code) = result.error_code() {
            let message = result.error_message().unwrap_or_default().to_string();
            warn!(event_bus = %envelope.event_bus_name, code, "Event entry rejected: {}", message);
            return Err(match code {
                BUS_NOT_FOUND => PublishError::BusNotFound {
                    bus: envelope.event_bus_name.clone(),
                },
                _ => PublishError::Rejected {
                    code: code.to_string(),
                    message,
                },
            });
        }

        let event_id = result.event_id().ok_or_else(|| {
            PublishError::Transport("PutEvents returned no event id".to_string())
        })?;

        debug!(
            event_bus = %envelope.event_bus_name,
            event_id,
            detail_type = %envelope.detail_type,
            "Event published"
        );
        Ok(PublishResult::new(EventId::from_string(event_id), envelope))
    }
}
