//! Apicurio-compatible HTTP schema registry.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::RegistryConfig;
use crate::domain::schema::{
    RegistryLocation, RegistryType, SchemaDocument, SchemaId, SchemaReference,
};
use crate::ports::{RegistryError, SchemaRegistry};

const ARTIFACTS_API: [&str; 4] = ["apis", "registry", "v2", "groups"];

/// Schema registry speaking the Apicurio v2 REST API.
///
/// Artifacts are fetched from
/// `{url}/apis/registry/v2/groups/{group}/artifacts/{name}` (latest) or
/// `.../artifacts/{name}/versions/{version}`.
pub struct HttpSchemaRegistry {
    client: reqwest::Client,
    base_url: Url,
    group: String,
}

impl HttpSchemaRegistry {
    /// Creates a registry client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Misconfigured` if the URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        group: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RegistryError::Misconfigured(format!("invalid registry URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::Misconfigured(format!(
                "registry URL cannot be a base: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Misconfigured(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            group: group.into(),
        })
    }

    /// Builds the registry from configuration.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| RegistryError::Misconfigured("registry URL not configured".to_string()))?;
        Self::new(url, config.group.clone(), config.timeout())
    }

    fn location(&self) -> RegistryLocation {
        RegistryLocation::Url {
            base_url: self.base_url.as_str().trim_end_matches('/').to_string(),
            group: self.group.clone(),
        }
    }

    fn artifact_url(&self, id: &SchemaId) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(ARTIFACTS_API);
            segments.extend([self.group.as_str(), "artifacts", id.name()]);
            if let Some(version) = id.version() {
                segments.extend(["versions", version]);
            }
        }
        url
    }

    /// Maps the response status: 404 is a missing schema, any other failure
    /// means the registry is unavailable.
    async fn check_response(
        response: reqwest::Response,
        id: &SchemaId,
    ) -> Result<reqwest::Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::not_found(id.to_string()));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| status.to_string());
        error!(schema_id = %id, %status, "Schema registry returned error: {}", body);
        Err(RegistryError::Unavailable(format!(
            "status={}, body={}",
            status, body
        )))
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn resolve(&self, schema_id: &str) -> Result<Arc<SchemaDocument>, RegistryError> {
        let id = SchemaId::parse(schema_id).map_err(|e| RegistryError::invalid(schema_id, e))?;
        let url = self.artifact_url(&id);

        debug!(schema_id = %id, %url, "Fetching schema artifact");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json, application/x-yaml")
            .send()
            .await
            .map_err(|e| {
                error!(schema_id = %id, "Schema registry request failed: {}", e);
                RegistryError::Unavailable(e.to_string())
            })?;

        let response = Self::check_response(response, &id).await?;
        let content = response
            .text()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        let reference = SchemaReference::new(self.location(), id.clone());
        let document = SchemaDocument::parse(reference, &content)
            .map_err(|e| RegistryError::invalid(id.to_string(), e))?;

        debug!(schema_id = %id, fingerprint = document.fingerprint(), "Schema resolved");
        Ok(Arc::new(document))
    }

    fn registry_type(&self) -> RegistryType {
        RegistryType::Http
    }
}
