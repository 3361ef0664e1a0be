//! Event module - outbound envelopes, publish results and trace context.

mod envelope;
mod trace_context;

pub use envelope::{EventEnvelope, PublishResult, IDEMPOTENCY_KEY_FIELD, MAX_ENTRY_BYTES};
pub use trace_context::{mint_trace_id, TraceContext, TRACE_CONTEXT_FIELD};
