//! Application configuration module
//!
//! Configuration is loaded from environment variables with the
//! `EVENTBRIDGE_CLIENT` prefix, nested values separated by `__`. An optional
//! file (YAML, TOML or JSON, chosen by extension) can supply the base layer,
//! with environment variables overriding it.
//!
//! # Example
//!
//! ```no_run
//! use eventbridge_client::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Registry backend: {}", config.registry.registry_type);
//! ```

mod aws;
mod consumer;
mod error;
mod registry;
mod telemetry;

pub use aws::AwsConfig;
pub use consumer::{ConsumerConfig, MAX_BATCH_SIZE, MAX_WAIT_TIME_SECS};
pub use error::{ConfigError, ValidationError};
pub use registry::RegistryConfig;
pub use telemetry::{LogFormat, OtlpConfig, TelemetryConfig};

use serde::Deserialize;
use std::path::Path;

/// Prefix for every environment variable read by [`AppConfig::load()`].
pub const ENV_PREFIX: &str = "EVENTBRIDGE_CLIENT";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Schema registry backend and its connection settings
    pub registry: RegistryConfig,

    /// AWS region, endpoint override and optional static credentials
    #[serde(default)]
    pub aws: AwsConfig,

    /// Queue consumer settings; absent for producer-only deployments
    #[serde(default)]
    pub consumer: Option<ConsumerConfig>,

    /// Logging settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `EVENTBRIDGE_CLIENT__*` variables:
    ///
    /// - `EVENTBRIDGE_CLIENT__REGISTRY__REGISTRY_TYPE=apicurio` -> `registry.registry_type`
    /// - `EVENTBRIDGE_CLIENT__CONSUMER__QUEUE_URL=...` -> `consumer.queue_url`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a file, with environment variables layered on top.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.registry.validate()?;
        self.aws.validate()?;
        if let Some(consumer) = &self.consumer {
            consumer.validate()?;
        }
        self.telemetry.validate()?;
        Ok(())
    }

    /// Region for the cloud schema service, falling back to the AWS region.
    pub fn registry_region(&self) -> &str {
        self.registry.region.as_deref().unwrap_or(&self.aws.region)
    }
}

fn environment() -> config::Environment {
    config::Environment::default()
        .prefix(ENV_PREFIX)
        .separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::RegistryType;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "EVENTBRIDGE_CLIENT__REGISTRY__REGISTRY_TYPE",
        "EVENTBRIDGE_CLIENT__REGISTRY__URL",
        "EVENTBRIDGE_CLIENT__AWS__REGION",
        "EVENTBRIDGE_CLIENT__AWS__ENDPOINT_URL",
        "EVENTBRIDGE_CLIENT__CONSUMER__QUEUE_URL",
        "EVENTBRIDGE_CLIENT__CONSUMER__SCHEMA_NAME",
        "EVENTBRIDGE_CLIENT__CONSUMER__MAX_MESSAGES",
        "EVENTBRIDGE_CLIENT__TELEMETRY__FORMAT",
        "EVENTBRIDGE_CLIENT__TELEMETRY__OTLP__ENDPOINT",
        "EVENTBRIDGE_CLIENT__TELEMETRY__OTLP__SAMPLE_RATIO",
    ];

    fn set_minimal_env() {
        env::set_var("EVENTBRIDGE_CLIENT__REGISTRY__REGISTRY_TYPE", "apicurio");
        env::set_var("EVENTBRIDGE_CLIENT__REGISTRY__URL", "http://localhost:8080");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.registry.registry_type, RegistryType::Http);
        assert_eq!(config.registry.url.as_deref(), Some("http://localhost:8080"));
        assert!(config.consumer.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_registry_type_is_required() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("EVENTBRIDGE_CLIENT__REGISTRY__URL", "http://localhost:8080");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_unsupported_registry_type_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("EVENTBRIDGE_CLIENT__REGISTRY__REGISTRY_TYPE", "confluent");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_consumer_section_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var(
            "EVENTBRIDGE_CLIENT__CONSUMER__QUEUE_URL",
            "http://localhost:4566/000000000000/files",
        );
        env::set_var("EVENTBRIDGE_CLIENT__CONSUMER__SCHEMA_NAME", "FileUploaded-v0");
        env::set_var("EVENTBRIDGE_CLIENT__CONSUMER__MAX_MESSAGES", "5");
        env::set_var("EVENTBRIDGE_CLIENT__TELEMETRY__FORMAT", "json");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        let consumer = config.consumer.as_ref().unwrap();
        assert_eq!(consumer.schema_name, "FileUploaded-v0");
        assert_eq!(consumer.max_messages, 5);
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "registry:\n  registry_type: eventbridge\n  registry_name: orders\naws:\n  region: eu-west-1\n  endpoint_url: http://localhost:4566\n"
        )
        .unwrap();

        env::set_var("EVENTBRIDGE_CLIENT__AWS__REGION", "eu-central-1");
        let result = AppConfig::load_from_file(file.path());
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.registry.registry_type, RegistryType::Cloud);
        assert_eq!(config.registry.registry_name, "orders");
        assert_eq!(config.aws.region, "eu-central-1");
        assert_eq!(config.registry_region(), "eu-central-1");
        assert_eq!(config.aws.endpoint_url.as_deref(), Some("http://localhost:4566"));
    }

    #[test]
    fn test_validate_reports_invalid_consumer() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("EVENTBRIDGE_CLIENT__CONSUMER__QUEUE_URL", "http://localhost/q");
        env::set_var("EVENTBRIDGE_CLIENT__CONSUMER__SCHEMA_NAME", "Files");
        env::set_var("EVENTBRIDGE_CLIENT__CONSUMER__MAX_MESSAGES", "50");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidMaxMessages(50))
        );
    }

    #[test]
    fn test_otlp_export_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var(
            "EVENTBRIDGE_CLIENT__TELEMETRY__OTLP__ENDPOINT",
            "http://collector:4317",
        );
        env::set_var("EVENTBRIDGE_CLIENT__TELEMETRY__OTLP__SAMPLE_RATIO", "0.25");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        let otlp = config.telemetry.otlp.as_ref().unwrap();
        assert_eq!(otlp.endpoint, "http://collector:4317");
        assert_eq!(otlp.sample_ratio, 0.25);
        assert!(config.validate().is_ok());
    }
}
