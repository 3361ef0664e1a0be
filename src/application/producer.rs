//! EventProducer - validates event details and publishes them to a bus.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};

use super::ClientError;
use crate::domain::event::{EventEnvelope, PublishResult, TraceContext};
use crate::ports::{EventPublisher, SchemaRegistry, SchemaValidator};
use crate::telemetry;

/// One event to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ProduceRequest {
    pub event_bus_name: String,
    pub source: String,
    pub detail_type: String,
    pub detail: Value,
    /// Schema identifier, `name` or `name:version`.
    pub schema_name: String,
    pub trace_context: Option<TraceContext>,
    pub idempotency_key: Option<String>,
}

impl ProduceRequest {
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
}

/// Produces schema-validated events.
///
/// Each call resolves the schema, validates the detail, builds the envelope
/// and publishes it, in that order. Nothing is published when resolution or
/// validation fails, and nothing is retried. Safe to share between tasks.
#[derive(Clone)]
pub struct EventProducer {
    registry: Arc<dyn SchemaRegistry>,
    validator: Arc<dyn SchemaValidator>,
    publisher: Arc<dyn EventPublisher>,
    propagate_trace: bool,
    xray_header: bool,
}

impl EventProducer {
    pub fn new(
        registry: Arc<dyn SchemaRegistry>,
        validator: Arc<dyn SchemaValidator>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry,
            validator,
            publisher,
            propagate_trace: false,
            xray_header: false,
        }
    }

    /// Attaches a trace context to requests that carry none: the active
    /// exported span's when there is one, otherwise a new root.
    pub fn with_trace_propagation(mut self) -> Self {
        self.propagate_trace = true;
        self
    }

    /// Forwards an X-Ray trace header derived from each event's trace
    /// context, so the bus continues the trace.
    pub fn with_xray_trace_header(mut self) -> Self {
        self.xray_header = true;
        self
    }

    /// Validates `detail` against `schema_name` and publishes it.
    ///
    /// # Errors
    ///
    /// - `SchemaNotFound` / `RegistryUnavailable` / `InvalidSchema` from resolution
    /// - `Validation` listing every violated field
    /// - `Publish` when the bus or its transport refuses the event
    pub async fn produce(
        &self,
        event_bus_name: &str,
        source: &str,
        detail_type: &str,
        detail: Value,
        schema_name: &str,
    ) -> Result<PublishResult, ClientError> {
        self.send(ProduceRequest::new(
            event_bus_name,
            source,
            detail_type,
            detail,
            schema_name,
        ))
        .await
    }

    /// Produces one event described by `request`.
    pub async fn send(&self, request: ProduceRequest) -> Result<PublishResult, ClientError> {
        let span = info_span!(
            "produce",
            event_bus = %request.event_bus_name,
            detail_type = %request.detail_type,
            schema_id = %request.schema_name,
            trace_id = field::Empty,
            event_id = field::Empty
        );
        self.send_in_span(request).instrument(span).await
    }

    async fn send_in_span(&self, request: ProduceRequest) -> Result<PublishResult, ClientError> {
        let ProduceRequest {
            event_bus_name,
            source,
            detail_type,
            detail,
            schema_name,
            trace_context,
            idempotency_key,
        } = request;

        let mut envelope =
            EventEnvelope::new(event_bus_name, source, detail_type, detail, schema_name);
        envelope
            .validate_fields()
            .map_err(ClientError::InvalidRequest)?;

        // 1. Resolve schema
        let schema = self.registry.resolve(&envelope.schema_name).await?;

        // 2. Validate detail
        if let Err(e) = self.validator.validate(&schema, &envelope.detail) {
            warn!(
                schema_id = %envelope.schema_name,
                fields = ?e.fields(),
                "Event detail failed schema validation"
            );
            return Err(e.into());
        }

        // 3. Attach propagation metadata
        let trace_context = trace_context.or_else(|| {
            self.propagate_trace
                .then(|| telemetry::current_trace_context().unwrap_or_else(TraceContext::new_root))
        });
        if let Some(mut context) = trace_context {
            if self.xray_header {
                context = context.with_derived_xray_header();
            }
            Span::current().record("trace_id", context.trace_id());
            envelope = envelope.with_trace_context(context);
        }
        if let Some(key) = idempotency_key {
            envelope = envelope.with_idempotency_key(key);
        }

        debug!(
            event_bus = %envelope.event_bus_name,
            detail_type = %envelope.detail_type,
            size = envelope.entry_size(),
            "Publishing event"
        );

        // 4. Publish
        let result = self.publisher.publish(&envelope).await?;
        Span::current().record("event_id", field::display(&result.event_id));

        info!(
            event_id = %result.event_id,
            event_bus = %result.event_bus_name,
            schema_id = %result.schema_name,
            "Event produced"
        );
        Ok(result)
    }
}
