//! SQS queue adapter.

use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use std::time::Duration;
use tracing::{debug, error};

use crate::adapters::aws::{error_chain, error_code, load_sdk_config};
use crate::config::{AwsConfig, ConsumerConfig, MAX_BATCH_SIZE, MAX_WAIT_TIME_SECS};
use crate::domain::foundation::{ReceiptHandle, Timestamp};
use crate::domain::message::RawMessage;
use crate::ports::{MessageQueue, QueueError};

/// Error codes meaning the caller's credentials were refused.
const CREDENTIAL_ERRORS: [&str; 4] = [
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "InvalidSecurity",
    "ExpiredToken",
];

const RECEIPT_HANDLE_INVALID: &str = "ReceiptHandleIsInvalid";

/// `MessageQueue` over one SQS queue URL.
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    visibility_timeout: Option<i32>,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            visibility_timeout: None,
        }
    }

    /// Overrides the queue's default visibility timeout for received messages.
    pub fn with_visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout = Some(i32::try_from(seconds).unwrap_or(i32::MAX));
        self
    }

    /// Builds the SDK client from shared AWS configuration.
    pub async fn connect(aws: &AwsConfig, consumer: &ConsumerConfig) -> Self {
        let sdk_config = load_sdk_config(aws, None).await;
        let queue = Self::new(Client::new(&sdk_config), consumer.queue_url.clone());
        match consumer.visibility_timeout_secs {
            Some(seconds) => queue.with_visibility_timeout(seconds),
            None => queue,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

fn is_credential_error(code: Option<&str>) -> bool {
    code.is_some_and(|code| CREDENTIAL_ERRORS.contains(&code))
}

fn convert(message: &aws_sdk_sqs::types::Message) -> Option<RawMessage> {
    let receipt_handle = message.receipt_handle()?;
    let attributes = message.attributes();
    let attribute = |name: MessageSystemAttributeName| {
        attributes.and_then(|attrs| attrs.get(&name)).map(String::as_str)
    };

    let receive_count = attribute(MessageSystemAttributeName::ApproximateReceiveCount)
        .and_then(|count| count.parse().ok())
        .unwrap_or(1);
    let sent_at = attribute(MessageSystemAttributeName::SentTimestamp)
        .and_then(|millis| millis.parse().ok())
        .and_then(Timestamp::from_unix_millis);

    let mut raw = RawMessage::new(
        message.message_id().unwrap_or_default(),
        receipt_handle,
        message.body().unwrap_or_default(),
    )
    .with_receive_count(receive_count);
    raw.sent_at = sent_at;
    Some(raw)
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(
        &self,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, QueueError> {
        let max_messages = max_messages.clamp(1, MAX_BATCH_SIZE);
        let wait_secs = wait_time.as_secs().min(MAX_WAIT_TIME_SECS);

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages as i32)
            .wait_time_seconds(wait_secs as i32)
            .set_visibility_timeout(self.visibility_timeout)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .message_system_attribute_names(MessageSystemAttributeName::SentTimestamp)
            .send()
            .await
            .map_err(|err| {
                let message = error_chain(&err);
                if is_credential_error(error_code(&err)) {
                    error!(queue_url = %self.queue_url, "Invalid AWS credentials: {}", message);
                    return QueueError::InvalidCredentials(message);
                }
                error!(queue_url = %self.queue_url, "ReceiveMessage failed: {}", message);
                QueueError::Receive(message)
            })?;

        let messages: Vec<RawMessage> = output.messages().iter().filter_map(convert).collect();
        debug!(queue_url = %self.queue_url, count = messages.len(), "Messages received");
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle.as_str())
            .send()
            .await
            .map_err(|err| {
                let message = error_chain(&err);
                let code = error_code(&err);
                if is_credential_error(code) {
                    return QueueError::InvalidCredentials(message);
                }
                if code == Some(RECEIPT_HANDLE_INVALID) {
                    return QueueError::StaleReceipt(message);
                }
                error!(queue_url = %self.queue_url, "DeleteMessage failed: {}", message);
                QueueError::Delete(message)
            })?;

        debug!(queue_url = %self.queue_url, receipt = ?receipt_handle, "Message deleted");
        Ok(())
    }
}
