//! In-memory queue emulating SQS visibility semantics.
//!
//! For tests and offline development. Received messages are hidden for the
//! visibility timeout and come back with a fresh receipt handle unless they
//! are deleted first. With a max receive count set, a message received once
//! too often is moved to a dead-letter list instead of being delivered.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::foundation::{MessageId, ReceiptHandle, Timestamp};
use crate::domain::message::RawMessage;
use crate::ports::{MessageQueue, QueueError};

/// SQS default visibility timeout.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    sent_at: Timestamp,
    receive_count: u32,
    visible_at: Instant,
    receipt: Option<ReceiptHandle>,
}

#[derive(Default)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    dead_letters: Vec<RawMessage>,
    deleted: usize,
    receipts_issued: u64,
}

/// Visibility-timeout queue held in memory.
///
/// # Example
///
/// ```ignore
/// let queue = InMemoryQueue::new(Duration::from_secs(30));
/// queue.send(r#"{"detail":{"file_id":"f-1"}}"#);
///
/// let batch = queue.receive(10, Duration::ZERO).await?;
/// queue.expire_visibility(); // simulate the timeout lapsing
/// ```
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    visibility_timeout: Duration,
    max_receive_count: Option<u32>,
    arrivals: Notify,
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            visibility_timeout,
            max_receive_count: None,
            arrivals: Notify::new(),
        }
    }

    /// Moves messages to the dead-letter list once they have been received
    /// `max_receive_count` times without being deleted.
    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.max_receive_count = Some(max_receive_count.max(1));
        self
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a message body, returning its message id.
    pub fn send(&self, body: impl Into<String>) -> MessageId {
        let message_id = MessageId::new(Uuid::new_v4().to_string());
        self.state().messages.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: body.into(),
            sent_at: Timestamp::now(),
            receive_count: 0,
            visible_at: Instant::now(),
            receipt: None,
        });
        self.arrivals.notify_waiters();
        message_id
    }

    /// Enqueues a JSON body.
    pub fn send_json(&self, body: &Value) -> MessageId {
        self.send(body.to_string())
    }

    /// Makes every in-flight message visible again, as if its visibility
    /// timeout had lapsed. Old receipt handles stop working.
    pub fn expire_visibility(&self) {
        let now = Instant::now();
        let mut state = self.state();
        for message in state.messages.iter_mut() {
            message.visible_at = now;
            message.receipt = None;
        }
        drop(state);
        self.arrivals.notify_waiters();
    }

    /// Messages still in the queue, visible or in flight.
    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages currently received and not yet deleted or expired.
    pub fn in_flight_count(&self) -> usize {
        let now = Instant::now();
        self.state()
            .messages
            .iter()
            .filter(|m| m.receipt.is_some() && m.visible_at > now)
            .count()
    }

    /// Number of successful deletes.
    pub fn deleted_count(&self) -> usize {
        self.state().deleted
    }

    /// Messages redriven after exceeding the max receive count.
    pub fn dead_letters(&self) -> Vec<RawMessage> {
        self.state().dead_letters.clone()
    }

    /// Takes every visible message up to `max`, or `None` with the instant
    /// the next in-flight message becomes visible.
    fn take_visible(&self, max: usize) -> (Vec<RawMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut state = self.state();
        let QueueState {
            messages,
            dead_letters,
            receipts_issued,
            ..
        } = &mut *state;

        let mut batch = Vec::new();
        let mut index = 0;
        while index < messages.len() && batch.len() < max {
            if messages[index].visible_at > now {
                index += 1;
                continue;
            }

            let redrive = self
                .max_receive_count
                .is_some_and(|limit| messages[index].receive_count >= limit);
            if redrive {
                if let Some(message) = messages.remove(index) {
                    dead_letters.push(
                        RawMessage::new(message.message_id.as_str(), "", message.body)
                            .with_receive_count(message.receive_count),
                    );
                }
                continue;
            }

            *receipts_issued += 1;
            let message = &mut messages[index];
            message.receive_count += 1;
            message.visible_at = now + self.visibility_timeout;
            let receipt = ReceiptHandle::new(format!(
                "{}#{}",
                message.message_id.as_str(),
                receipts_issued
            ));
            message.receipt = Some(receipt.clone());

            let mut raw = RawMessage::new(
                message.message_id.as_str(),
                receipt.as_str(),
                message.body.clone(),
            )
            .with_receive_count(message.receive_count);
            raw.sent_at = Some(message.sent_at);
            batch.push(raw);
            index += 1;
        }

        let next_visible = messages
            .iter()
            .map(|m| m.visible_at)
            .filter(|at| *at > now)
            .min();
        (batch, next_visible)
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_TIMEOUT)
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn receive(
        &self,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, QueueError> {
        let max = max_messages.max(1) as usize;
        let deadline = Instant::now() + wait_time;

        loop {
            let arrival = self.arrivals.notified();
            let (batch, next_visible) = self.take_visible(max);
            if !batch.is_empty() || Instant::now() >= deadline {
                return Ok(batch);
            }

            let wake = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = arrival => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<(), QueueError> {
        let mut state = self.state();
        let position = state
            .messages
            .iter()
            .position(|m| m.receipt.as_ref() == Some(receipt_handle));

        match position {
            Some(index) => {
                state.messages.remove(index);
                state.deleted += 1;
                Ok(())
            }
            None => Err(QueueError::StaleReceipt(receipt_handle.as_str().to_string())),
        }
    }
}
