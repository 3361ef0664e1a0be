//! Outbound event envelope and publish result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TraceContext, TRACE_CONTEXT_FIELD};
use crate::domain::foundation::{EventId, Timestamp, ValidationError};

/// Detail key holding the caller's idempotency key.
pub const IDEMPOTENCY_KEY_FIELD: &str = "idempotency_key";

/// Largest entry the bus accepts (256 KiB).
pub const MAX_ENTRY_BYTES: usize = 256 * 1024;

/// Everything needed to put one event on a bus.
///
/// Built per publish and handed to the bus; nothing is kept afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_bus_name: String,
    pub source: String,
    pub detail_type: String,
    pub detail: Value,
    /// Schema the detail was validated against.
    pub schema_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<TraceContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl EventEnvelope {
    pub fn new(
        event_bus_name: impl Into<String>,
        source: impl Into<String>,
        detail_type: impl Into<String>,
        detail: Value,
        schema_name: impl Into<String>,
    ) -> Self {
        Self {
            event_bus_name: event_bus_name.into(),
            source: source.into(),
            detail_type: detail_type.into(),
            detail,
            schema_name: schema_name.into(),
            trace_context: None,
            idempotency_key: None,
        }
    }

    pub fn with_trace_context(mut self, context: TraceContext) -> Self {
        self.trace_context = Some(context);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Checks the fields every bus entry requires.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyField` for the first blank field.
    pub fn validate_fields(&self) -> Result<(), ValidationError> {
        let required = [
            ("event_bus_name", &self.event_bus_name),
            ("source", &self.source),
            ("detail_type", &self.detail_type),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::empty_field(field));
            }
        }
        Ok(())
    }

    /// Detail as it goes on the wire.
    ///
    /// Trace context and idempotency key become top-level keys of an object
    /// detail. Other detail shapes are sent unchanged.
    pub fn wire_detail(&self) -> Value {
        let mut detail = self.detail.clone();
        if let Value::Object(map) = &mut detail {
            if let Some(context) = &self.trace_context {
                if let Ok(carrier) = serde_json::to_value(context) {
                    map.insert(TRACE_CONTEXT_FIELD.to_string(), carrier);
                }
            }
            if let Some(key) = &self.idempotency_key {
                map.insert(IDEMPOTENCY_KEY_FIELD.to_string(), Value::String(key.clone()));
            }
        }
        detail
    }

    /// Serialized wire detail.
    pub fn serialized_detail(&self) -> String {
        self.wire_detail().to_string()
    }

    /// Entry size as the bus computes it: source, detail-type, detail and
    /// trace header bytes.
    pub fn entry_size(&self) -> usize {
        let trace_header = self
            .trace_context
            .as_ref()
            .and_then(TraceContext::xray_trace_header)
            .map_or(0, str::len);
        self.source.len() + self.detail_type.len() + self.serialized_detail().len() + trace_header
    }

    pub fn exceeds_size_limit(&self) -> bool {
        self.entry_size() > MAX_ENTRY_BYTES
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Identifier assigned by the bus.
    pub event_id: EventId,
    pub event_bus_name: String,
    pub schema_name: String,
    pub published_at: Timestamp,
}

impl PublishResult {
    pub fn new(event_id: EventId, envelope: &EventEnvelope) -> Self {
        Self {
            event_id,
            event_bus_name: envelope.event_bus_name.clone(),
            schema_name: envelope.schema_name.clone(),
            published_at: Timestamp::now(),
        }
    }
}
