//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid schema registry URL: {0}")]
    InvalidRegistryUrl(String),

    #[error("Invalid AWS endpoint URL: {0}")]
    InvalidEndpointUrl(String),

    #[error("Access key id and secret access key must be set together")]
    IncompleteCredentials,

    #[error("Invalid schema name: {0}")]
    InvalidSchemaName(String),

    #[error("max_messages must be between 1 and 10, got {0}")]
    InvalidMaxMessages(u32),

    #[error("wait_time_secs must be at most 20, got {0}")]
    InvalidWaitTime(u64),

    #[error("processing_timeout_secs must be greater than zero")]
    InvalidProcessingTimeout,

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),

    #[error("Invalid OTLP endpoint: {0}")]
    InvalidOtlpEndpoint(String),

    #[error("sample_ratio must be between 0 and 1, got {0}")]
    InvalidSampleRatio(String),
}
