//! AWS transport configuration

use secrecy::Secret;
use serde::Deserialize;

use super::error::ValidationError;

/// AWS configuration shared by the bus, queue and schema service clients
///
/// Credentials are optional; without them the SDK's default provider chain
/// applies. `endpoint_url` points every client at an emulator such as
/// LocalStack.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint override for local or offline testing
    pub endpoint_url: Option<String>,

    /// Static access key id
    pub access_key_id: Option<String>,

    /// Static secret access key
    pub secret_access_key: Option<Secret<String>>,

    /// Session token for temporary credentials
    pub session_token: Option<Secret<String>>,
}

impl AwsConfig {
    /// Check if static credentials are configured
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// Validate AWS configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.region.trim().is_empty() {
            return Err(ValidationError::MissingRequired("AWS_REGION"));
        }
        if let Some(url) = &self.endpoint_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidEndpointUrl(url.clone()));
            }
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(ValidationError::IncompleteCredentials);
        }
        Ok(())
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}
