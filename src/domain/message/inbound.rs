//! Messages as delivered by a queue.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::MessageState;
use crate::domain::event::{TraceContext, IDEMPOTENCY_KEY_FIELD, TRACE_CONTEXT_FIELD};
use crate::domain::foundation::{
    EventId, MessageId, ReceiptHandle, StateMachine, Timestamp, ValidationError,
};
use crate::domain::schema::SchemaDocument;

/// A message exactly as the queue returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    pub body: String,
    /// How many times the queue has handed this message out, this time
    /// included.
    pub receive_count: u32,
    pub sent_at: Option<Timestamp>,
}

impl RawMessage {
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: MessageId::new(message_id),
            receipt_handle: ReceiptHandle::new(receipt_handle),
            body: body.into(),
            receive_count: 1,
            sent_at: None,
        }
    }

    pub fn with_receive_count(mut self, receive_count: u32) -> Self {
        self.receive_count = receive_count;
        self
    }
}

/// A delivered message on its way through validation and processing.
///
/// The payload is the `detail` of an EventBridge envelope when the body is
/// one, otherwise the whole body. Propagation keys (`trace_context`,
/// `idempotency_key`) are lifted out of the payload onto the message.
///
/// Not `Clone`: one delivery is one value, so committing it moves it out.
///
/// ```compile_fail
/// fn assert_clone<T: Clone>() {}
/// assert_clone::<eventbridge_client::domain::message::InboundMessage>();
/// ```
#[derive(Debug)]
pub struct InboundMessage {
    message_id: MessageId,
    receipt_handle: ReceiptHandle,
    body: String,
    payload: Value,
    source: Option<String>,
    detail_type: Option<String>,
    bus_event_id: Option<EventId>,
    receive_count: u32,
    received_at: Timestamp,
    schema: Arc<SchemaDocument>,
    trace_context: Option<TraceContext>,
    idempotency_key: Option<String>,
    state: MessageState,
}

impl InboundMessage {
    /// Wraps a freshly polled message.
    pub fn new(raw: RawMessage, schema: Arc<SchemaDocument>) -> Self {
        Self {
            message_id: raw.message_id,
            receipt_handle: raw.receipt_handle,
            body: raw.body,
            payload: Value::Null,
            source: None,
            detail_type: None,
            bus_event_id: None,
            receive_count: raw.receive_count,
            received_at: Timestamp::now(),
            schema,
            trace_context: None,
            idempotency_key: None,
            state: MessageState::Polled,
        }
    }

    /// Moves to `Validating` and parses the body into the payload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the state does not allow validation or
    /// the body is not JSON. The message stays in `Validating` on a parse
    /// failure so it can be reported.
    pub fn decode(&mut self) -> Result<&Value, ValidationError> {
        self.transition(MessageState::Validating)?;

        let body: Value = serde_json::from_str(&self.body)
            .map_err(|e| ValidationError::invalid_format("body", e.to_string()))?;

        let mut payload = match body {
            Value::Object(mut envelope) if envelope.contains_key("detail") => {
                self.source = string_field(&envelope, "source");
                self.detail_type = string_field(&envelope, "detail-type");
                self.bus_event_id = string_field(&envelope, "id").map(EventId::from_string);
                envelope.remove("detail").unwrap_or(Value::Null)
            }
            other => other,
        };

        self.trace_context = TraceContext::extract(&payload);
        if let Value::Object(map) = &mut payload {
            map.remove(TRACE_CONTEXT_FIELD);
            self.idempotency_key = map
                .remove(IDEMPOTENCY_KEY_FIELD)
                .and_then(|v| v.as_str().map(str::to_string));
        }

        self.payload = payload;
        Ok(&self.payload)
    }

    /// Validation passed; hand to processing.
    pub(crate) fn mark_processing(&mut self) -> Result<(), ValidationError> {
        self.transition(MessageState::Processing)
    }

    /// Processing succeeded and the queue accepted the delete.
    pub(crate) fn mark_committed(&mut self) -> Result<(), ValidationError> {
        self.transition(MessageState::Committed)
    }

    /// Validation or processing failed; the message stays in the queue.
    pub(crate) fn mark_reported(&mut self) -> Result<(), ValidationError> {
        self.transition(MessageState::Reported)
    }

    fn transition(&mut self, target: MessageState) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(target)?;
        Ok(())
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn receipt_handle(&self) -> &ReceiptHandle {
        &self.receipt_handle
    }

    /// Body exactly as delivered.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Validated payload (`Null` before decoding).
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserialize the payload into a typed event.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// `source` of the bus envelope, when delivered through a bus rule.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// `detail-type` of the bus envelope, when delivered through a bus rule.
    pub fn detail_type(&self) -> Option<&str> {
        self.detail_type.as_deref()
    }

    /// Bus-assigned event id, when delivered through a bus rule.
    pub fn bus_event_id(&self) -> Option<&EventId> {
        self.bus_event_id.as_ref()
    }

    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }

    /// True when this is not the first delivery.
    pub fn is_redelivery(&self) -> bool {
        self.receive_count > 1
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    pub fn schema(&self) -> &SchemaDocument {
        &self.schema
    }

    pub fn trace_context(&self) -> Option<&TraceContext> {
        self.trace_context.as_ref()
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn state(&self) -> MessageState {
        self.state
    }
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}
