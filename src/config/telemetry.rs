//! Logging and trace export configuration

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Service name reported when logging starts
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Span export; spans stay in-process when unset
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,
}

/// OTLP span export over gRPC.
///
/// Jaeger and the AWS Distro collector both accept this protocol.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OtlpConfig {
    /// Collector endpoint, e.g. `http://localhost:4317`
    pub endpoint: String,

    /// Fraction of new traces that are sampled
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,

    /// Mint trace ids that X-Ray accepts (epoch seconds in the first 4 bytes)
    #[serde(default)]
    pub xray_ids: bool,
}

impl OtlpConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sample_ratio: default_sample_ratio(),
            xray_ids: false,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ValidationError::InvalidOtlpEndpoint(format!("{}: {}", self.endpoint, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ValidationError::InvalidOtlpEndpoint(self.endpoint.clone()));
        }
        if !(0.0..=1.0).contains(&self.sample_ratio) {
            return Err(ValidationError::InvalidSampleRatio(
                self.sample_ratio.to_string(),
            ));
        }
        Ok(())
    }
}

impl TelemetryConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| ValidationError::InvalidLogFilter(e.to_string()))?;
        match &self.otlp {
            Some(otlp) => otlp.validate(),
            None => Ok(()),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            filter: default_filter(),
            format: LogFormat::default(),
            otlp: None,
        }
    }
}

fn default_service_name() -> String {
    "eventbridge-client".to_string()
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_sample_ratio() -> f64 {
    1.0
}
