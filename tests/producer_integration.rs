//! Integration tests for the producer path.
//!
//! Exercises resolve -> validate -> publish end to end against the
//! in-memory registry and bus, checking that nothing reaches the bus unless
//! the detail conforms to its schema.

use serde_json::{json, Value};
use std::sync::Arc;

use eventbridge_client::adapters::{
    CachingSchemaRegistry, InMemoryEventBus, InMemorySchemaRegistry, JsonSchemaValidator,
};
use eventbridge_client::domain::event::TraceContext;
use eventbridge_client::domain::foundation::ErrorCode;
use eventbridge_client::ports::{PublishError, SchemaRegistry};
use eventbridge_client::{ClientError, EventProducer, ProduceRequest};

// =============================================================================
// Test Infrastructure
// =============================================================================

const SCHEMA: &str = "FileUploaded-v0";

fn file_uploaded_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["file_id", "size"],
        "properties": {
            "file_id": { "type": "string" },
            "size": { "type": "integer", "minimum": 0 },
            "owner": {
                "type": "object",
                "required": ["id"],
                "properties": { "id": { "type": "string" } }
            }
        }
    })
}

struct Harness {
    registry: Arc<InMemorySchemaRegistry>,
    bus: Arc<InMemoryEventBus>,
    producer: EventProducer,
}

fn harness_with(bus: InMemoryEventBus) -> Harness {
    let registry = Arc::new(
        InMemorySchemaRegistry::new()
            .with_schema(SCHEMA, file_uploaded_schema())
            .unwrap(),
    );
    let bus = Arc::new(bus);
    let producer = EventProducer::new(
        registry.clone(),
        Arc::new(JsonSchemaValidator::new()),
        bus.clone(),
    );
    Harness {
        registry,
        bus,
        producer,
    }
}

fn harness() -> Harness {
    harness_with(InMemoryEventBus::new())
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn valid_detail_is_published_once() {
    let h = harness();

    let result = h
        .producer
        .produce(
            "default",
            "com.example.files",
            "FileUploaded",
            json!({"file_id": "f-1", "size": 42}),
            SCHEMA,
        )
        .await
        .unwrap();

    assert_eq!(result.event_bus_name, "default");
    assert_eq!(result.schema_name, SCHEMA);
    assert_eq!(h.bus.event_ids(), vec![result.event_id]);

    let published = h.bus.events_of_type("FileUploaded");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].source, "com.example.files");
    assert_eq!(published[0].detail["size"], 42);
}

#[tokio::test]
async fn invalid_detail_never_reaches_the_bus() {
    let h = harness();

    let err = h
        .producer
        .produce(
            "default",
            "com.example.files",
            "FileUploaded",
            json!({"size": -1, "owner": {}}),
            SCHEMA,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ValidationFailed);
    let mut fields = err.violated_fields();
    fields.sort_unstable();
    assert_eq!(fields, vec!["/file_id", "/owner/id", "/size"]);
    assert_eq!(h.bus.event_count(), 0);
}

#[tokio::test]
async fn unknown_schema_fails_before_publishing() {
    let h = harness();

    let err = h
        .producer
        .produce(
            "default",
            "com.example.files",
            "FileDeleted",
            json!({"file_id": "f-1"}),
            "FileDeleted-v0",
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ClientError::SchemaNotFound {
            schema_id: "FileDeleted-v0".to_string()
        }
    );
    assert!(!err.is_transient());
    assert_eq!(h.bus.event_count(), 0);
}

#[tokio::test]
async fn registry_outage_is_transient() {
    let h = harness();
    h.registry.set_unavailable(true);

    let err = h
        .producer
        .produce(
            "default",
            "com.example.files",
            "FileUploaded",
            json!({"file_id": "f-1", "size": 1}),
            SCHEMA,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::RegistryUnavailable(_)));
    assert!(err.is_transient());
    assert_eq!(h.bus.event_count(), 0);
}

#[tokio::test]
async fn unknown_bus_surfaces_publish_error() {
    let h = harness_with(InMemoryEventBus::new().with_buses(["orders"]));

    let err = h
        .producer
        .produce(
            "default",
            "com.example.files",
            "FileUploaded",
            json!({"file_id": "f-1", "size": 1}),
            SCHEMA,
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ClientError::Publish(PublishError::BusNotFound {
            bus: "default".to_string()
        })
    );
}

#[tokio::test]
async fn transport_failure_can_be_retried() {
    let h = harness();
    h.bus
        .fail_next(PublishError::Transport("connection reset".to_string()));
    let request = || {
        ProduceRequest::new(
            "default",
            "com.example.files",
            "FileUploaded",
            json!({"file_id": "f-1", "size": 1}),
            SCHEMA,
        )
        .with_idempotency_key("upload-f-1")
    };

    let err = h.producer.send(request()).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(h.bus.event_count(), 0);

    h.producer.send(request()).await.unwrap();
    let published = h.bus.published_events();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].idempotency_key.as_deref(), Some("upload-f-1"));
}

#[tokio::test]
async fn trace_context_travels_with_the_event() {
    let h = harness();
    let parent = TraceContext::new_root();

    h.producer
        .send(
            ProduceRequest::new(
                "default",
                "com.example.files",
                "FileUploaded",
                json!({"file_id": "f-1", "size": 1}),
                SCHEMA,
            )
            .with_trace_context(parent.clone()),
        )
        .await
        .unwrap();

    let published = h.bus.published_events();
    let context = published[0].trace_context.as_ref().unwrap();
    assert_eq!(context.trace_id(), parent.trace_id());
}

#[tokio::test]
async fn cached_registry_resolves_each_schema_once() {
    let registry = Arc::new(
        InMemorySchemaRegistry::new()
            .with_schema(SCHEMA, file_uploaded_schema())
            .unwrap(),
    );
    let cached: Arc<dyn SchemaRegistry> =
        Arc::new(CachingSchemaRegistry::with_default_capacity(registry.clone()));
    let bus = Arc::new(InMemoryEventBus::new());
    let producer = EventProducer::new(cached, Arc::new(JsonSchemaValidator::new()), bus.clone());

    for i in 0..5 {
        producer
            .produce(
                "default",
                "com.example.files",
                "FileUploaded",
                json!({"file_id": format!("f-{}", i), "size": i}),
                SCHEMA,
            )
            .await
            .unwrap();
    }

    assert_eq!(registry.resolve_count(), 1);
    assert_eq!(bus.event_count(), 5);
}

#[tokio::test]
async fn nested_event_detail_against_wrapped_schema() {
    let registry = Arc::new(
        InMemorySchemaRegistry::new()
            .with_schema(
                SCHEMA,
                json!({
                    "type": "object",
                    "required": ["event_type", "data"],
                    "properties": {
                        "event_type": { "type": "string" },
                        "data": {
                            "type": "object",
                            "required": ["file_id"],
                            "properties": { "file_id": { "type": "string" } }
                        }
                    }
                }),
            )
            .unwrap(),
    );
    let bus = Arc::new(InMemoryEventBus::new());
    let producer = EventProducer::new(registry, Arc::new(JsonSchemaValidator::new()), bus.clone());

    let result = producer
        .produce(
            "default",
            "com.example.files",
            "FileUploaded",
            json!({
                "event_type": "FileUploaded-v0",
                "data": { "file_id": "98765432-1234-5678-9abc-def012345678" }
            }),
            SCHEMA,
        )
        .await
        .unwrap();

    assert!(!result.event_id.as_str().is_empty());
    assert!(bus.has_event("FileUploaded"));
}
