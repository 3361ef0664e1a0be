//! Tracing subscriber setup and OpenTelemetry span export.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapPropagator as _;
use opentelemetry::trace::{SpanId, TraceContextExt, TraceId, TracerProvider as _};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self as sdktrace, IdGenerator, RandomIdGenerator};
use opentelemetry_sdk::Resource;
use thiserror::Error;
use tracing::{info, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, OtlpConfig, TelemetryConfig};
use crate::domain::event::{mint_trace_id, TraceContext};

static INITIALIZED: OnceCell<bool> = OnceCell::new();

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("OTLP exporter could not be built: {0}")]
    Exporter(String),
}

/// Installs the global subscriber, exporting spans when `config.otlp` is set.
///
/// `RUST_LOG` takes precedence over `config.filter`. Only the first
/// successful call has an effect; later calls return what it did. Returns
/// `Ok(false)` when another global subscriber was already installed.
///
/// Must run inside a Tokio runtime when span export is configured.
pub fn init(config: &TelemetryConfig) -> Result<bool, TelemetryError> {
    INITIALIZED
        .get_or_try_init(|| {
            let tracer = config
                .otlp
                .as_ref()
                .map(|otlp| otlp_tracer(otlp, &config.service_name))
                .transpose()?;
            let exporting = tracer.is_some();

            let filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.filter))
                .unwrap_or_else(|_| EnvFilter::new("info"));
            let registry = tracing_subscriber::registry()
                .with(filter)
                .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)));

            let installed = match config.format {
                LogFormat::Pretty => registry
                    .with(fmt::layer().with_target(true))
                    .try_init()
                    .is_ok(),
                LogFormat::Json => registry
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_current_span(true)
                            .with_span_events(FmtSpan::NONE),
                    )
                    .try_init()
                    .is_ok(),
            };

            if installed {
                info!(
                    service = %config.service_name,
                    format = ?config.format,
                    otlp_endpoint = config.otlp.as_ref().map(|o| o.endpoint.as_str()),
                    "Logging initialized"
                );
            } else if exporting {
                global::shutdown_tracer_provider();
            }
            Ok(installed)
        })
        .copied()
}

/// Flushes pending spans and stops the exporter.
pub fn shutdown() {
    global::shutdown_tracer_provider();
}

fn otlp_tracer(
    config: &OtlpConfig,
    service_name: &str,
) -> Result<sdktrace::Tracer, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.endpoint.clone())
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    let builder = sdktrace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(sdktrace::Sampler::ParentBased(Box::new(
            sdktrace::Sampler::TraceIdRatioBased(config.sample_ratio),
        )))
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]));
    let provider = if config.xray_ids {
        builder.with_id_generator(XrayIdGenerator::default()).build()
    } else {
        builder.build()
    };

    let tracer = provider.tracer("eventbridge-client");
    global::set_tracer_provider(provider);
    global::set_text_map_propagator(TraceContextPropagator::new());
    Ok(tracer)
}

/// Trace ids whose first 4 bytes are the epoch second, as X-Ray requires.
#[derive(Debug, Default)]
struct XrayIdGenerator {
    spans: RandomIdGenerator,
}

impl IdGenerator for XrayIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        TraceId::from_bytes(mint_trace_id())
    }

    fn new_span_id(&self) -> SpanId {
        self.spans.new_span_id()
    }
}

/// Trace context of the current span, when spans are being exported.
pub fn current_trace_context() -> Option<TraceContext> {
    let cx = Span::current().context();
    let span = cx.span();
    let span_context = span.span_context();
    if !span_context.is_valid() {
        return None;
    }

    let flags = if span_context.is_sampled() { "01" } else { "00" };
    let context = TraceContext::parse(&format!(
        "00-{}-{}-{}",
        span_context.trace_id(),
        span_context.span_id(),
        flags
    ))
    .ok()?;
    let tracestate = span_context.trace_state().header();
    Some(if tracestate.is_empty() {
        context
    } else {
        context.with_tracestate(tracestate)
    })
}

/// Makes `span` a child of the remote span described by `context`.
pub fn set_remote_parent(span: &Span, context: &TraceContext) {
    let mut carrier = HashMap::new();
    carrier.insert("traceparent".to_string(), context.traceparent().to_string());
    if let Some(tracestate) = context.tracestate() {
        carrier.insert("tracestate".to_string(), tracestate.to_string());
    }
    let parent = global::get_text_map_propagator(|propagator| propagator.extract(&carrier));
    span.set_parent(parent);
}
