//! Schema registry configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::schema::RegistryType;

/// Schema registry configuration
///
/// `registry_type` has no default: the backend is always chosen explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Backend kind (`apicurio`/`http` or `eventbridge`/`cloud`)
    pub registry_type: RegistryType,

    /// Base URL of the HTTP registry
    pub url: Option<String>,

    /// Artifact group on the HTTP registry
    #[serde(default = "default_group")]
    pub group: String,

    /// Region of the cloud schema service (falls back to `aws.region`)
    pub region: Option<String>,

    /// Registry name on the cloud schema service
    #[serde(default = "default_registry_name")]
    pub registry_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Resolved schemas kept per instance; 0 disables caching
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl RegistryConfig {
    /// HTTP registry at `url` with defaults for everything else.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            registry_type: RegistryType::Http,
            url: Some(url.into()),
            ..Self::defaults(RegistryType::Http)
        }
    }

    /// Cloud schema service in `region` with defaults for everything else.
    pub fn cloud(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..Self::defaults(RegistryType::Cloud)
        }
    }

    fn defaults(registry_type: RegistryType) -> Self {
        Self {
            registry_type,
            url: None,
            group: default_group(),
            region: None,
            registry_name: default_registry_name(),
            timeout_secs: default_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate registry configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.registry_type == RegistryType::Http {
            let url = self
                .url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or(ValidationError::MissingRequired("REGISTRY_URL"))?;
            let parsed = reqwest::Url::parse(url)
                .map_err(|_| ValidationError::InvalidRegistryUrl(url.to_string()))?;
            let http = matches!(parsed.scheme(), "http" | "https");
            if !http || parsed.host_str().is_none() {
                return Err(ValidationError::InvalidRegistryUrl(url.to_string()));
            }
        }
        Ok(())
    }
}

fn default_group() -> String {
    "default".to_string()
}

fn default_registry_name() -> String {
    "discovered-schemas".to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_cache_capacity() -> usize {
    100
}
