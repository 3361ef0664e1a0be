//! Long-running consumer.
//!
//! Loads configuration from `EVENTBRIDGE_CLIENT__*` variables (or the file
//! named by `EVENTBRIDGE_CLIENT_CONFIG`), then polls the configured queue and
//! logs every valid event until interrupted.

use std::sync::Arc;

use tracing::{error, info};

use eventbridge_client::adapters::{connect_registry, JsonSchemaValidator, SqsQueue};
use eventbridge_client::config::{AppConfig, ConfigError};
use eventbridge_client::domain::message::InboundMessage;
use eventbridge_client::ports::{FnHandler, HandlerError};
use eventbridge_client::{telemetry, EventConsumer, EventConsumerConfig};

const CONFIG_FILE_VAR: &str = "EVENTBRIDGE_CLIENT_CONFIG";

fn load_config() -> Result<AppConfig, ConfigError> {
    let config = match std::env::var(CONFIG_FILE_VAR) {
        Ok(path) => AppConfig::load_from_file(path)?,
        Err(_) => AppConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn log_event(message: &InboundMessage) -> Result<(), HandlerError> {
    info!(
        message_id = %message.message_id(),
        source = message.source().unwrap_or("-"),
        detail_type = message.detail_type().unwrap_or("-"),
        receive_count = message.receive_count(),
        payload = %message.payload(),
        "Event received"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    telemetry::init(&config.telemetry)?;

    let Some(consumer_config) = config.consumer.as_ref() else {
        error!("No consumer section configured; set EVENTBRIDGE_CLIENT__CONSUMER__QUEUE_URL");
        return Err("consumer configuration missing".into());
    };

    let registry = connect_registry(&config.registry, &config.aws).await?;
    let queue = SqsQueue::connect(&config.aws, consumer_config).await;
    info!(queue_url = queue.queue_url(), "Polling queue");

    let consumer = EventConsumer::new(
        Arc::new(queue),
        registry,
        Arc::new(JsonSchemaValidator::new()),
        EventConsumerConfig::from(consumer_config),
    );
    let handle = consumer.start(Arc::new(FnHandler::new("log-event", log_event)));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, finishing in-flight batch");

    let totals = handle.shutdown().await?;
    info!(
        committed = totals.committed,
        rejected = totals.rejected,
        handler_failures = totals.handler_failures,
        "Consumer finished"
    );
    telemetry::shutdown();
    Ok(())
}
