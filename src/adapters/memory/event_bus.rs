//! In-memory event bus implementation for testing.
//!
//! Records every published envelope for assertions and can forward events
//! to in-memory queues the way an EventBridge rule targets SQS.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::InMemoryQueue;
use crate::domain::event::{EventEnvelope, PublishResult, MAX_ENTRY_BYTES};
use crate::domain::foundation::{EventId, Timestamp};
use crate::ports::{EventPublisher, PublishError};

/// In-memory event bus for testing.
///
/// Features:
/// - Event capture for assertions
/// - Optional set of known buses (unknown ones fail with `BusNotFound`)
/// - Injected failures
/// - Delivery to queue targets wrapped in the bus's JSON envelope
///
/// # Example
///
/// ```ignore
/// let bus = InMemoryEventBus::new();
/// producer.produce("default", "com.example", "FileUploaded", detail, "FileUploaded-v0").await?;
///
/// assert_eq!(bus.event_count(), 1);
/// assert!(bus.has_event("FileUploaded"));
/// ```
pub struct InMemoryEventBus {
    published: Mutex<Vec<(EventId, EventEnvelope)>>,
    known_buses: Option<HashSet<String>>,
    targets: Vec<Arc<InMemoryQueue>>,
    failure: Mutex<Option<PublishError>>,
}

impl InMemoryEventBus {
    /// Creates a bus accepting any bus name.
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            known_buses: None,
            targets: Vec::new(),
            failure: Mutex::new(None),
        }
    }

    /// Only the named buses exist; publishing elsewhere fails.
    pub fn with_buses<I, S>(mut self, buses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_buses = Some(buses.into_iter().map(Into::into).collect());
        self
    }

    /// Delivers every published event to `queue`.
    pub fn with_target(mut self, queue: Arc<InMemoryQueue>) -> Self {
        self.targets.push(queue);
        self
    }

    /// Fails the next publish with `error`.
    pub fn fail_next(&self, error: PublishError) {
        *lock(&self.failure) = Some(error);
    }

    // === Test Helpers ===

    /// Returns all published events (for test assertions).
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        lock(&self.published)
            .iter()
            .map(|(_, envelope)| envelope.clone())
            .collect()
    }

    /// Returns the ids assigned to published events, in publish order.
    pub fn event_ids(&self) -> Vec<EventId> {
        lock(&self.published)
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Returns events of a specific detail type.
    pub fn events_of_type(&self, detail_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.detail_type == detail_type)
            .collect()
    }

    /// Clears all published events (for test isolation).
    pub fn clear(&self) {
        lock(&self.published).clear();
    }

    /// Returns count of published events.
    pub fn event_count(&self) -> usize {
        lock(&self.published).len()
    }

    /// Checks if an event of the detail type was published.
    pub fn has_event(&self, detail_type: &str) -> bool {
        lock(&self.published)
            .iter()
            .any(|(_, e)| e.detail_type == detail_type)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The JSON an SQS target receives for one event.
fn target_body(event_id: &EventId, envelope: &EventEnvelope, time: Timestamp) -> String {
    json!({
        "version": "0",
        "id": event_id.as_str(),
        "detail-type": envelope.detail_type,
        "source": envelope.source,
        "time": time.to_string(),
        "resources": [],
        "detail": envelope.wire_detail(),
    })
    .to_string()
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<PublishResult, PublishError> {
        if let Some(error) = lock(&self.failure).take() {
            return Err(error);
        }

        let size = envelope.entry_size();
        if size > MAX_ENTRY_BYTES {
            return Err(PublishError::PayloadTooLarge {
                size,
                limit: MAX_ENTRY_BYTES,
            });
        }

        if let Some(known) = &self.known_buses {
            if !known.contains(&envelope.event_bus_name) {
                return Err(PublishError::BusNotFound {
                    bus: envelope.event_bus_name.clone(),
                });
            }
        }

        let event_id = EventId::new();
        let result = PublishResult::new(event_id.clone(), envelope);

        if !self.targets.is_empty() {
            let body = target_body(&event_id, envelope, result.published_at);
            for queue in &self.targets {
                queue.send(body.clone());
            }
        }

        lock(&self.published).push((event_id, envelope.clone()));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MessageQueue;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn envelope(bus: &str) -> EventEnvelope {
        EventEnvelope::new(
            bus,
            "com.example.files",
            "FileUploaded",
            json!({"file_id": "f-1"}),
            "FileUploaded-v0",
        )
    }

    #[tokio::test]
    async fn publish_records_event_and_assigns_id() {
        let bus = InMemoryEventBus::new();
        let result = bus.publish(&envelope("default")).await.unwrap();

        assert!(!result.event_id.as_str().is_empty());
        assert_eq!(result.event_bus_name, "default");
        assert_eq!(bus.event_count(), 1);
        assert!(bus.has_event("FileUploaded"));
        assert_eq!(bus.event_ids(), vec![result.event_id]);
    }

    #[tokio::test]
    async fn unknown_bus_is_not_found() {
        let bus = InMemoryEventBus::new().with_buses(["orders"]);
        let err = bus.publish(&envelope("default")).await.unwrap_err();
        assert_eq!(
            err,
            PublishError::BusNotFound {
                bus: "default".to_string()
            }
        );
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn oversized_entry_is_refused() {
        let bus = InMemoryEventBus::new();
        let big = EventEnvelope::new(
            "default",
            "s",
            "t",
            json!({"blob": "x".repeat(MAX_ENTRY_BYTES)}),
            "S",
        );
        assert!(matches!(
            bus.publish(&big).await,
            Err(PublishError::PayloadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let bus = InMemoryEventBus::new();
        bus.fail_next(PublishError::Transport("connection reset".to_string()));
        assert!(bus.publish(&envelope("default")).await.is_err());
        assert!(bus.publish(&envelope("default")).await.is_ok());
    }

    #[tokio::test]
    async fn target_queue_receives_bus_envelope() {
        let queue = Arc::new(InMemoryQueue::default());
        let bus = InMemoryEventBus::new().with_target(Arc::clone(&queue));
        let result = bus
            .publish(&envelope("default").with_idempotency_key("k-1"))
            .await
            .unwrap();

        let delivered = queue.receive(1, Duration::ZERO).await.unwrap();
        let body: Value = serde_json::from_str(&delivered[0].body).unwrap();
        assert_eq!(body["id"], result.event_id.as_str());
        assert_eq!(body["detail-type"], "FileUploaded");
        assert_eq!(body["detail"]["file_id"], "f-1");
        assert_eq!(body["detail"]["idempotency_key"], "k-1");
        assert_eq!(body["time"], serde_json::to_value(result.published_at).unwrap());
    }

    #[tokio::test]
    async fn clear_resets_captured_events() {
        let bus = InMemoryEventBus::new();
        bus.publish(&envelope("default")).await.unwrap();
        bus.clear();
        assert_eq!(bus.event_count(), 0);
        assert!(bus.events_of_type("FileUploaded").is_empty());
    }
}
