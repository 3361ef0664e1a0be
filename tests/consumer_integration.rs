//! Integration tests for the consumer path.
//!
//! These tests verify the end-to-end flow:
//! 1. Producer validates and publishes to the bus
//! 2. The bus forwards its JSON envelope to a queue target
//! 3. Consumer polls, validates against the same schema and invokes the handler
//! 4. Messages are deleted only after the handler succeeded
//!
//! Uses in-memory implementations to test without external dependencies.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eventbridge_client::adapters::{
    InMemoryEventBus, InMemoryQueue, InMemorySchemaRegistry, JsonSchemaValidator,
};
use eventbridge_client::domain::message::InboundMessage;
use eventbridge_client::ports::{HandlerError, MessageHandler};
use eventbridge_client::{
    BatchReport, ClientError, EventConsumer, EventConsumerConfig, EventProducer,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const SCHEMA: &str = "OrderPlaced-v1";

fn registry() -> Arc<InMemorySchemaRegistry> {
    let registry = InMemorySchemaRegistry::new()
        .with_schema(
            SCHEMA,
            json!({
                "type": "object",
                "required": ["order_id", "total"],
                "properties": {
                    "order_id": { "type": "string" },
                    "total": { "type": "number" }
                }
            }),
        )
        .unwrap();
    Arc::new(registry)
}

fn consumer_for(queue: Arc<InMemoryQueue>, registry: Arc<InMemorySchemaRegistry>) -> EventConsumer {
    EventConsumer::new(
        queue,
        registry,
        Arc::new(JsonSchemaValidator::new()),
        EventConsumerConfig::new(SCHEMA)
            .with_poll_interval(Duration::from_millis(10))
            .with_wait_time(Duration::ZERO)
            .with_processing_timeout(Duration::from_secs(1)),
    )
}

/// Handler recording every payload, failing the first `fail_first` calls.
struct RecordingHandler {
    seen: Mutex<Vec<(Value, u32)>>,
    calls: AtomicUsize,
    fail_first: usize,
}

impl RecordingHandler {
    fn new() -> Self {
        Self::failing_first(0)
    }

    fn failing_first(fail_first: usize) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_first,
        }
    }

    fn seen(&self) -> Vec<(Value, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((message.payload().clone(), message.receive_count()));
        if call < self.fail_first {
            return Err(HandlerError::failed("downstream unavailable"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

async fn wait_until_empty(queue: &InMemoryQueue) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue was not drained in time");
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn produced_events_are_consumed_through_the_bus() {
    let registry = registry();
    let queue = Arc::new(InMemoryQueue::default());
    let bus = Arc::new(InMemoryEventBus::new().with_target(queue.clone()));
    let producer = EventProducer::new(
        registry.clone(),
        Arc::new(JsonSchemaValidator::new()),
        bus.clone(),
    );

    for (order_id, total) in [("o-1", 10.5), ("o-2", 3.0)] {
        producer
            .produce(
                "orders",
                "com.example.shop",
                "OrderPlaced",
                json!({"order_id": order_id, "total": total}),
                SCHEMA,
            )
            .await
            .unwrap();
    }

    let consumer = consumer_for(queue.clone(), registry);
    let handler = RecordingHandler::new();
    let report = consumer.process_batch(&handler).await.unwrap();

    assert_eq!(report.received, 2);
    assert_eq!(report.committed, 2);
    assert!(queue.is_empty());

    let order_ids: Vec<Value> = handler
        .seen()
        .into_iter()
        .map(|(payload, _)| payload["order_id"].clone())
        .collect();
    assert_eq!(order_ids, vec![json!("o-1"), json!("o-2")]);
}

#[tokio::test]
async fn polled_message_exposes_bus_metadata() {
    let registry = registry();
    let queue = Arc::new(InMemoryQueue::default());
    let bus = Arc::new(InMemoryEventBus::new().with_target(queue.clone()));
    let producer = EventProducer::new(
        registry.clone(),
        Arc::new(JsonSchemaValidator::new()),
        bus.clone(),
    );
    let result = producer
        .produce(
            "orders",
            "com.example.shop",
            "OrderPlaced",
            json!({"order_id": "o-1", "total": 1}),
            SCHEMA,
        )
        .await
        .unwrap();

    let consumer = consumer_for(queue.clone(), registry);
    let message = consumer.poll(Duration::ZERO).await.unwrap().unwrap();

    assert_eq!(message.source(), Some("com.example.shop"));
    assert_eq!(message.detail_type(), Some("OrderPlaced"));
    assert_eq!(message.bus_event_id(), Some(&result.event_id));
    assert_eq!(message.payload()["order_id"], "o-1");

    consumer.commit(message).await.unwrap();
    assert_eq!(queue.deleted_count(), 1);
}

#[tokio::test]
async fn empty_queue_polls_to_none() {
    let consumer = consumer_for(Arc::new(InMemoryQueue::default()), registry());

    let polled = consumer.poll(Duration::from_millis(20)).await.unwrap();
    assert!(polled.is_none());
}

#[tokio::test]
async fn malformed_message_is_reported_and_left_for_redrive() {
    let queue = Arc::new(InMemoryQueue::default());
    queue.send("{ not json");
    let consumer = consumer_for(queue.clone(), registry());

    let err = consumer.poll(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, ClientError::MalformedMessage { .. }));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.deleted_count(), 0);
}

#[tokio::test]
async fn handler_failure_leads_to_redelivery() {
    let queue = Arc::new(InMemoryQueue::default());
    queue.send_json(&json!({"order_id": "o-1", "total": 2}));
    let consumer = consumer_for(queue.clone(), registry());
    let handler = RecordingHandler::failing_first(1);

    let first = consumer.process_batch(&handler).await.unwrap();
    assert_eq!(first.handler_failures, 1);
    assert_eq!(queue.len(), 1);

    queue.expire_visibility();
    let second = consumer.process_batch(&handler).await.unwrap();
    assert_eq!(second.committed, 1);
    assert!(queue.is_empty());

    let receive_counts: Vec<u32> = handler.seen().into_iter().map(|(_, count)| count).collect();
    assert_eq!(receive_counts, vec![1, 2]);
}

#[tokio::test]
async fn repeatedly_failing_message_is_dead_lettered() {
    let queue = Arc::new(InMemoryQueue::default().with_max_receive_count(2));
    queue.send_json(&json!({"order_id": "o-1", "total": 2}));
    let consumer = consumer_for(queue.clone(), registry());
    let handler = RecordingHandler::failing_first(usize::MAX);

    for _ in 0..2 {
        consumer.process_batch(&handler).await.unwrap();
        queue.expire_visibility();
    }
    let report = consumer.process_batch(&handler).await.unwrap();

    assert_eq!(report.received, 0);
    assert!(queue.is_empty());
    assert_eq!(queue.dead_letters().len(), 1);
}

#[tokio::test]
async fn background_consumer_drains_queue_and_reports_on_shutdown() {
    let registry = registry();
    let queue = Arc::new(InMemoryQueue::default());
    for i in 0..5 {
        queue.send_json(&json!({"detail": {"order_id": format!("o-{}", i), "total": i}}));
    }
    queue.send_json(&json!({"detail": {"order_id": 99}}));
    let handler = Arc::new(RecordingHandler::new());

    let handle = consumer_for(queue.clone(), registry).start(handler.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while handler.seen().len() < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("handler did not see every valid message");

    let totals = handle.shutdown().await.unwrap();
    assert_eq!(totals.committed, 5);
    assert!(totals.rejected >= 1);
    assert_eq!(totals.handler_failures, 0);
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn batch_report_absorbs_iterations() {
    let queue = Arc::new(InMemoryQueue::default());
    let consumer = consumer_for(queue.clone(), registry());
    let handler = RecordingHandler::new();
    let mut totals = BatchReport::default();

    for i in 0..3 {
        queue.send_json(&json!({"order_id": format!("o-{}", i), "total": i}));
        totals.absorb(consumer.process_batch(&handler).await.unwrap());
    }
    wait_until_empty(&queue).await;

    assert_eq!(totals.received, 3);
    assert_eq!(totals.committed, 3);
}
