//! EventConsumer - polls a queue, validates each message and hands it to a
//! handler.
//!
//! Two modes share the same validation path:
//!
//! - **Single-shot**: [`EventConsumer::poll`] returns one validated message
//!   and the caller decides when to [`commit`](EventConsumer::commit) it.
//!   Nothing is ever deleted without that call.
//! - **Continuous**: [`EventConsumer::run`] (or [`EventConsumer::start`] on a
//!   background task) repeats [`process_batch`](EventConsumer::process_batch)
//!   every poll interval, committing each message whose handler succeeds.
//!
//! ## Failure handling
//!
//! | Failure | Effect |
//! |---------|--------|
//! | Registry or queue unavailable | iteration logged and skipped |
//! | Malformed body / schema violation | message reported, left in queue |
//! | Handler error, timeout or panic | message left for redelivery |
//! | Delete refused | logged; the message is redelivered later |
//!
//! ## Graceful Shutdown
//!
//! A stop request interrupts the wait for messages and the pause between
//! iterations, never a batch being handled.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

use super::ClientError;
use crate::config::ConsumerConfig;
use crate::domain::foundation::{Timestamp, ValidationError};
use crate::domain::message::{InboundMessage, MessageState, RawMessage};
use crate::domain::schema::SchemaDocument;
use crate::ports::{HandlerError, MessageHandler, MessageQueue, SchemaRegistry, SchemaValidator};
use crate::telemetry;

/// Configuration for the EventConsumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventConsumerConfig {
    /// Schema every message is validated against.
    pub schema_name: String,

    /// Pause between iterations of the continuous loop.
    pub poll_interval: Duration,

    /// Maximum messages received per iteration.
    pub max_messages: u32,

    /// How long one receive call waits for messages.
    pub wait_time: Duration,

    /// Upper bound on one handler call; unbounded when `None`.
    pub processing_timeout: Option<Duration>,

    /// Receive count from which deliveries are logged as likely poison.
    pub warn_receive_count: Option<u32>,
}

impl EventConsumerConfig {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            poll_interval: Duration::from_secs(1),
            max_messages: 10,
            wait_time: Duration::from_secs(1),
            processing_timeout: None,
            warn_receive_count: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_processing_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = Some(timeout);
        self
    }

    pub fn with_warn_receive_count(mut self, count: u32) -> Self {
        self.warn_receive_count = Some(count);
        self
    }
}

impl From<&ConsumerConfig> for EventConsumerConfig {
    fn from(config: &ConsumerConfig) -> Self {
        Self {
            schema_name: config.schema_name.clone(),
            poll_interval: config.poll_interval(),
            max_messages: config.max_messages,
            wait_time: config.wait_time(),
            processing_timeout: config.processing_timeout(),
            warn_receive_count: config.warn_receive_count,
        }
    }
}

/// Outcome counts of one or more batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub committed: usize,
    /// Malformed or schema-violating messages, left in the queue.
    pub rejected: usize,
    pub handler_failures: usize,
    pub commit_failures: usize,
}

impl BatchReport {
    /// Adds another report's counts to this one.
    pub fn absorb(&mut self, other: BatchReport) {
        self.received += other.received;
        self.committed += other.committed;
        self.rejected += other.rejected;
        self.handler_failures += other.handler_failures;
        self.commit_failures += other.commit_failures;
    }
}

/// Polls one queue and validates against one schema.
///
/// Cloning is cheap; clones share the queue, registry and validator.
#[derive(Clone)]
pub struct EventConsumer {
    queue: Arc<dyn MessageQueue>,
    registry: Arc<dyn SchemaRegistry>,
    validator: Arc<dyn SchemaValidator>,
    config: EventConsumerConfig,
}

impl EventConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        registry: Arc<dyn SchemaRegistry>,
        validator: Arc<dyn SchemaValidator>,
        config: EventConsumerConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            validator,
            config,
        }
    }

    pub fn config(&self) -> &EventConsumerConfig {
        &self.config
    }

    // === Single-shot mode ===

    /// Waits up to `timeout` for one message and validates it.
    ///
    /// Returns `Ok(None)` when no message arrived. A returned message is in
    /// `Processing` and stays in the queue until passed to
    /// [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// - Registry errors when the schema cannot be resolved (nothing is received)
    /// - `Poll` when the queue cannot be read
    /// - `MalformedMessage` / `Validation` for a rejected message, which is
    ///   left in the queue
    pub async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>, ClientError> {
        let schema = self.registry.resolve(&self.config.schema_name).await?;

        let Some(raw) = self.queue.receive(1, timeout).await?.into_iter().next() else {
            debug!(schema_id = %self.config.schema_name, "No message available");
            return Ok(None);
        };

        let span = message_span(&raw);
        let admitted = self.admit(raw, &schema).instrument(span).await;
        admitted.map(Some)
    }

    /// Polls until a valid message arrives or `timeout` elapses, skipping
    /// rejected messages.
    pub async fn poll_valid(
        &self,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.poll(remaining).await {
                Ok(found) => return Ok(found),
                Err(ClientError::MalformedMessage { .. } | ClientError::Validation(_))
                    if Instant::now() < deadline => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Deletes a message returned by [`poll`](Self::poll).
    ///
    /// Consumes the message, so it cannot be committed twice.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the message passed validation
    /// - `Commit` when the queue refuses the delete; the message will be
    ///   redelivered after its visibility timeout
    pub async fn commit(&self, mut message: InboundMessage) -> Result<(), ClientError> {
        if message.state() != MessageState::Processing {
            return Err(ClientError::InvalidState(ValidationError::invalid_transition(
                message.state(),
                MessageState::Committed,
            )));
        }

        self.queue
            .delete(message.receipt_handle())
            .await
            .map_err(ClientError::Commit)?;
        message.mark_committed().map_err(ClientError::InvalidState)?;

        debug!(message_id = %message.message_id(), "Message committed");
        Ok(())
    }

    // === Continuous mode ===

    /// Runs one iteration: resolve the schema, receive a batch and handle
    /// every message in it, committing those whose handler succeeds.
    ///
    /// One bad message never aborts the batch.
    ///
    /// # Errors
    ///
    /// Registry and poll failures fail the whole iteration before any
    /// message is received.
    pub async fn process_batch(
        &self,
        handler: &dyn MessageHandler,
    ) -> Result<BatchReport, ClientError> {
        let (schema, batch) = self.receive_batch().await?;
        Ok(self.handle_batch(&schema, batch, handler).await)
    }

    /// Polls until `shutdown` turns true or its sender is dropped.
    ///
    /// Iteration failures are logged and retried after the poll interval.
    /// Returns the accumulated counts.
    pub async fn run(
        &self,
        handler: &dyn MessageHandler,
        mut shutdown: watch::Receiver<bool>,
    ) -> BatchReport {
        info!(
            schema_id = %self.config.schema_name,
            handler = handler.name(),
            poll_interval = ?self.config.poll_interval,
            "Consumer started"
        );

        let mut totals = BatchReport::default();
        loop {
            let received = tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                received = self.receive_batch() => received,
            };

            match received {
                Ok((schema, batch)) => {
                    let report = self.handle_batch(&schema, batch, handler).await;
                    if report.received > 0 {
                        info!(
                            received = report.received,
                            committed = report.committed,
                            rejected = report.rejected,
                            handler_failures = report.handler_failures,
                            "Batch processed"
                        );
                    }
                    totals.absorb(report);
                }
                Err(e) => {
                    error!(
                        schema_id = %self.config.schema_name,
                        code = %e.code(),
                        "Poll iteration failed: {}",
                        e
                    );
                }
            }

            tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                _ = time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(
            schema_id = %self.config.schema_name,
            committed = totals.committed,
            "Consumer stopped"
        );
        totals
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn start(&self, handler: Arc<dyn MessageHandler>) -> ConsumerHandle {
        let (stop, shutdown) = watch::channel(false);
        let consumer = self.clone();
        let task = tokio::spawn(async move { consumer.run(handler.as_ref(), shutdown).await });
        ConsumerHandle { stop, task }
    }

    // === Internals ===

    async fn receive_batch(&self) -> Result<(Arc<SchemaDocument>, Vec<RawMessage>), ClientError> {
        let schema = self.registry.resolve(&self.config.schema_name).await?;
        let batch = self
            .queue
            .receive(self.config.max_messages, self.config.wait_time)
            .await?;
        Ok((schema, batch))
    }

    async fn handle_batch(
        &self,
        schema: &Arc<SchemaDocument>,
        batch: Vec<RawMessage>,
        handler: &dyn MessageHandler,
    ) -> BatchReport {
        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };

        for raw in batch {
            let span = message_span(&raw);
            self.handle_message(raw, schema, handler, &mut report)
                .instrument(span)
                .await;
        }
        report
    }

    async fn handle_message(
        &self,
        raw: RawMessage,
        schema: &Arc<SchemaDocument>,
        handler: &dyn MessageHandler,
        report: &mut BatchReport,
    ) {
        let Ok(mut message) = self.admit(raw, schema).await else {
            report.rejected += 1;
            return;
        };

        match self.invoke(handler, &message).await {
            Ok(()) => match self.commit(message).await {
                Ok(()) => report.committed += 1,
                Err(e) => {
                    error!("Commit failed, message will be redelivered: {}", e);
                    report.commit_failures += 1;
                }
            },
            Err(e) => {
                warn!(
                    handler = handler.name(),
                    receive_count = message.receive_count(),
                    "Handler failed, message left for redelivery: {}",
                    e
                );
                if let Err(e) = message.mark_reported() {
                    debug!("Message state not updated: {}", e);
                }
                report.handler_failures += 1;
            }
        }
    }

    /// Decodes and validates a delivery. Rejected messages are logged and
    /// left in the queue.
    async fn admit(
        &self,
        raw: RawMessage,
        schema: &Arc<SchemaDocument>,
    ) -> Result<InboundMessage, ClientError> {
        let mut message = InboundMessage::new(raw, Arc::clone(schema));

        if let Some(limit) = self.config.warn_receive_count {
            if message.receive_count() >= limit {
                warn!(
                    receive_count = message.receive_count(),
                    "Message delivered repeatedly; check the queue's redrive policy"
                );
            }
        }

        if let Err(e) = message.decode() {
            warn!("Malformed message reported: {}", e);
            reject(&mut message);
            return Err(ClientError::MalformedMessage {
                message_id: message.message_id().to_string(),
                reason: e.to_string(),
            });
        }

        if let Some(context) = message.trace_context() {
            let span = Span::current();
            span.record("trace_id", context.trace_id());
            telemetry::set_remote_parent(&span, context);
        }

        if let Err(e) = self.validator.validate(schema, message.payload()) {
            warn!(
                schema_id = %self.config.schema_name,
                fields = ?e.fields(),
                "Message failed schema validation: {}",
                e
            );
            reject(&mut message);
            return Err(ClientError::Validation(e));
        }

        message.mark_processing().map_err(ClientError::InvalidState)?;
        Ok(message)
    }

    /// Calls the handler, converting timeouts and panics into errors.
    async fn invoke(
        &self,
        handler: &dyn MessageHandler,
        message: &InboundMessage,
    ) -> Result<(), HandlerError> {
        let call = AssertUnwindSafe(handler.handle(message)).catch_unwind();

        let outcome = match self.config.processing_timeout {
            Some(limit) => time::timeout(limit, call)
                .await
                .map_err(|_| HandlerError::TimedOut(limit))?,
            None => call.await,
        };

        outcome.unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(&*panic))))
    }
}

/// Handle to a consumer started with [`EventConsumer::start`].
pub struct ConsumerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<BatchReport>,
}

impl ConsumerHandle {
    /// Asks the loop to stop after the batch in flight.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop to end and returns its accumulated counts.
    pub async fn join(self) -> Result<BatchReport, JoinError> {
        self.task.await
    }

    /// Stops the loop and waits for it.
    pub async fn shutdown(self) -> Result<BatchReport, JoinError> {
        self.stop();
        self.join().await
    }
}

fn message_span(raw: &RawMessage) -> Span {
    let queued_ms = raw
        .sent_at
        .map(|sent| sent.millis_until(Timestamp::now()));
    info_span!(
        "message",
        message_id = %raw.message_id,
        receive_count = raw.receive_count,
        queued_ms,
        trace_id = field::Empty
    )
}

fn reject(message: &mut InboundMessage) {
    if let Err(e) = message.mark_reported() {
        debug!("Message state not updated: {}", e);
    }
}

/// Resolves once a stop is requested or the sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
