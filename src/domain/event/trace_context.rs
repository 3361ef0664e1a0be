//! W3C trace context carried inside event details.
//!
//! Producers put a `traceparent`/`tracestate` carrier under the
//! `trace_context` key of the detail; consumers read it back so handler
//! spans join the producer's trace.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::foundation::ValidationError;

/// Detail key holding the propagated carrier.
pub const TRACE_CONTEXT_FIELD: &str = "trace_context";

const VERSION: &str = "00";
const SAMPLED: &str = "01";

/// Propagated trace context.
///
/// Deserialization goes through [`TraceContext::parse`], so a held value
/// always carries a well-formed `traceparent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TraceCarrier")]
pub struct TraceContext {
    traceparent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tracestate: Option<String>,

    /// X-Ray header forwarded as the bus entry's trace header. Not part of
    /// the detail carrier.
    #[serde(skip)]
    xray_trace_header: Option<String>,
}

/// Wire form of the carrier, before validation.
#[derive(Deserialize)]
struct TraceCarrier {
    traceparent: String,
    #[serde(default)]
    tracestate: Option<String>,
}

impl TryFrom<TraceCarrier> for TraceContext {
    type Error = ValidationError;

    fn try_from(carrier: TraceCarrier) -> Result<Self, Self::Error> {
        let mut context = Self::parse(&carrier.traceparent)?;
        context.tracestate = carrier.tracestate;
        Ok(context)
    }
}

impl TraceContext {
    /// Starts a new sampled trace with an X-Ray compatible trace id.
    pub fn new_root() -> Self {
        Self::with_ids(&hex(&mint_trace_id()), &new_span_id())
    }

    /// Parses a `traceparent` header value.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` unless the value has the form
    /// `vv-<32 hex>-<16 hex>-ff` with non-zero ids.
    pub fn parse(traceparent: &str) -> Result<Self, ValidationError> {
        let parts: Vec<&str> = traceparent.trim().split('-').collect();
        let [version, trace_id, span_id, flags] = parts.as_slice() else {
            return Err(ValidationError::invalid_format(
                "traceparent",
                "expected 4 dash-separated segments",
            ));
        };

        let valid = is_hex(version, 2)
            && is_hex(trace_id, 32)
            && is_hex(span_id, 16)
            && is_hex(flags, 2)
            && !is_zero(trace_id)
            && !is_zero(span_id);
        if !valid {
            return Err(ValidationError::invalid_format(
                "traceparent",
                "malformed version, trace id, span id or flags",
            ));
        }

        Ok(Self {
            traceparent: traceparent.trim().to_ascii_lowercase(),
            tracestate: None,
            xray_trace_header: None,
        })
    }

    /// Reads the carrier from an event detail, if one is present and valid.
    pub fn extract(detail: &Value) -> Option<Self> {
        let carrier = detail.get(TRACE_CONTEXT_FIELD)?;
        let traceparent = carrier.get("traceparent")?.as_str()?;
        let mut context = Self::parse(traceparent).ok()?;
        context.tracestate = carrier
            .get("tracestate")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(context)
    }

    /// Same trace, new span.
    pub fn child(&self) -> Self {
        Self {
            traceparent: format!(
                "{}-{}-{}-{}",
                VERSION,
                self.trace_id(),
                new_span_id(),
                self.flags()
            ),
            tracestate: self.tracestate.clone(),
            xray_trace_header: self.xray_trace_header.clone(),
        }
    }

    pub fn with_tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.tracestate = Some(tracestate.into());
        self
    }

    pub fn with_xray_trace_header(mut self, header: impl Into<String>) -> Self {
        self.xray_trace_header = Some(header.into());
        self
    }

    pub fn traceparent(&self) -> &str {
        &self.traceparent
    }

    pub fn tracestate(&self) -> Option<&str> {
        self.tracestate.as_deref()
    }

    pub fn xray_trace_header(&self) -> Option<&str> {
        self.xray_trace_header.as_deref()
    }

    /// X-Ray `X-Amzn-Trace-Id` value for this trace and span.
    ///
    /// X-Ray only accepts the result when the first 8 hex digits of the
    /// trace id are a recent epoch second, as [`mint_trace_id`] produces.
    pub fn to_xray_header(&self) -> String {
        let trace_id = self.trace_id();
        let sampled = u8::from_str_radix(self.flags(), 16).map_or(0, |flags| flags & 1);
        format!(
            "Root=1-{}-{};Parent={};Sampled={}",
            &trace_id[..8],
            &trace_id[8..],
            self.span_id(),
            sampled
        )
    }

    /// Sets the forwarded X-Ray header from this context unless one is set.
    pub fn with_derived_xray_header(self) -> Self {
        if self.xray_trace_header.is_some() {
            return self;
        }
        let header = self.to_xray_header();
        self.with_xray_trace_header(header)
    }

    /// 32-hex trace id.
    pub fn trace_id(&self) -> &str {
        &self.traceparent[3..35]
    }

    /// 16-hex span id.
    pub fn span_id(&self) -> &str {
        &self.traceparent[36..52]
    }

    fn flags(&self) -> &str {
        &self.traceparent[53..55]
    }

    fn with_ids(trace_id: &str, span_id: &str) -> Self {
        Self {
            traceparent: format!("{}-{}-{}-{}", VERSION, trace_id, span_id, SAMPLED),
            tracestate: None,
            xray_trace_header: None,
        }
    }
}

/// Random trace id whose first 4 bytes are the current epoch second.
pub fn mint_trace_id() -> [u8; 16] {
    let mut bytes = *Uuid::new_v4().as_bytes();
    let secs = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
    bytes[..4].copy_from_slice(&secs.to_be_bytes());
    bytes
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

fn new_span_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_zero(s: &str) -> bool {
    s.chars().all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const SAMPLE: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn parse_accepts_w3c_example() {
        let ctx = TraceContext::parse(SAMPLE).unwrap();
        assert_eq!(ctx.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.span_id(), "00f067aa0ba902b7");
    }

    #[test]
    fn parse_rejects_malformed_values() {
        assert!(TraceContext::parse("").is_err());
        assert!(TraceContext::parse("00-abc-def-01").is_err());
        assert!(TraceContext::parse(
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01"
        )
        .is_err());
        assert!(TraceContext::parse(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra"
        )
        .is_err());
    }

    #[test]
    fn child_keeps_trace_and_changes_span() {
        let root = TraceContext::new_root();
        let child = root.child();
        assert_eq!(root.trace_id(), child.trace_id());
        assert_ne!(root.span_id(), child.span_id());
    }

    #[test]
    fn extract_reads_carrier_from_detail() {
        let detail = json!({
            "event_type": "FileUploaded-v0",
            "trace_context": {"traceparent": SAMPLE, "tracestate": "vendor=1"}
        });
        let ctx = TraceContext::extract(&detail).unwrap();
        assert_eq!(ctx.traceparent(), SAMPLE);
        assert_eq!(ctx.tracestate(), Some("vendor=1"));
    }

    #[test]
    fn extract_ignores_missing_or_invalid_carrier() {
        assert!(TraceContext::extract(&json!({"data": 1})).is_none());
        assert!(TraceContext::extract(&json!({"trace_context": {"traceparent": "nope"}})).is_none());
    }

    #[test]
    fn serialized_carrier_omits_xray_header() {
        let ctx = TraceContext::parse(SAMPLE)
            .unwrap()
            .with_xray_trace_header("Root=1-5759e988-bd862e3fe1be46a994272793");
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value, json!({"traceparent": SAMPLE}));
    }

    #[test]
    fn deserialization_validates_traceparent() {
        let err = serde_json::from_value::<TraceContext>(json!({"traceparent": "short"}));
        assert!(err.is_err());

        let ctx: TraceContext =
            serde_json::from_value(json!({"traceparent": SAMPLE, "tracestate": "vendor=1"}))
                .unwrap();
        assert_eq!(ctx.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.tracestate(), Some("vendor=1"));
    }

    #[test]
    fn xray_header_splits_trace_id() {
        let ctx = TraceContext::parse("00-5759e988bd862e3fe1be46a994272793-53995c3f42cd8ad8-01")
            .unwrap();
        assert_eq!(
            ctx.to_xray_header(),
            "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1"
        );

        let unsampled =
            TraceContext::parse("00-5759e988bd862e3fe1be46a994272793-53995c3f42cd8ad8-00")
                .unwrap();
        assert!(unsampled.to_xray_header().ends_with("Sampled=0"));
    }

    #[test]
    fn derived_xray_header_keeps_explicit_one() {
        let explicit = TraceContext::parse(SAMPLE)
            .unwrap()
            .with_xray_trace_header("Root=1-00000001-000000000000000000000001")
            .with_derived_xray_header();
        assert_eq!(
            explicit.xray_trace_header(),
            Some("Root=1-00000001-000000000000000000000001")
        );

        let derived = TraceContext::parse(SAMPLE).unwrap().with_derived_xray_header();
        assert_eq!(derived.xray_trace_header(), Some(derived.to_xray_header().as_str()));
    }

    #[test]
    fn root_trace_id_starts_with_epoch_seconds() {
        let before = chrono::Utc::now().timestamp();
        let root = TraceContext::new_root();
        let after = chrono::Utc::now().timestamp();

        let secs = i64::from_str_radix(&root.trace_id()[..8], 16).unwrap();
        assert!((before..=after).contains(&secs));
    }

    proptest! {
        #[test]
        fn minted_contexts_always_parse(_seed in 0u8..32) {
            let root = TraceContext::new_root();
            let parsed = TraceContext::parse(root.traceparent()).unwrap();
            prop_assert_eq!(parsed.trace_id(), root.trace_id());
            let child = parsed.child();
            prop_assert_eq!(child.trace_id(), root.trace_id());
        }
    }
}
