//! AWS EventBridge Schemas registry.

use async_trait::async_trait;
use aws_sdk_schemas::Client;
use std::sync::Arc;
use tracing::{debug, error};

use crate::adapters::aws::{error_chain, load_sdk_config};
use crate::config::AwsConfig;
use crate::domain::schema::{
    RegistryLocation, RegistryType, SchemaDocument, SchemaId, SchemaReference,
};
use crate::ports::{RegistryError, SchemaRegistry};

/// Schema registry backed by `DescribeSchema` on the EventBridge schema
/// service. Unversioned identifiers resolve to the latest version.
pub struct CloudSchemaRegistry {
    client: Client,
    region: String,
    registry_name: String,
}

impl CloudSchemaRegistry {
    pub fn new(client: Client, region: impl Into<String>, registry_name: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
            registry_name: registry_name.into(),
        }
    }

    /// Builds the SDK client from shared AWS configuration.
    pub async fn connect(
        aws: &AwsConfig,
        region: &str,
        registry_name: impl Into<String>,
    ) -> Self {
        let sdk_config = load_sdk_config(aws, Some(region)).await;
        Self::new(Client::new(&sdk_config), region, registry_name)
    }

    fn location(&self) -> RegistryLocation {
        RegistryLocation::Region {
            region: self.region.clone(),
            registry_name: self.registry_name.clone(),
        }
    }
}

#[async_trait]
impl SchemaRegistry for CloudSchemaRegistry {
    async fn resolve(&self, schema_id: &str) -> Result<Arc<SchemaDocument>, RegistryError> {
        let id = SchemaId::parse(schema_id).map_err(|e| RegistryError::invalid(schema_id, e))?;

        debug!(schema_id = %id, registry = %self.registry_name, "Describing schema");

        let output = self
            .client
            .describe_schema()
            .registry_name(&self.registry_name)
            .schema_name(id.name())
            .set_schema_version(id.version().map(str::to_string))
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_found_exception());
                if not_found {
                    RegistryError::not_found(id.to_string())
                } else {
                    let message = error_chain(&err);
                    error!(schema_id = %id, "Schema service request failed: {}", message);
                    RegistryError::Unavailable(message)
                }
            })?;

        let content = output
            .content()
            .ok_or_else(|| RegistryError::invalid(id.to_string(), "schema has no content"))?;

        let reference = SchemaReference::new(self.location(), id.clone());
        let document = SchemaDocument::parse(reference, content)
            .map_err(|e| RegistryError::invalid(id.to_string(), e))?;

        debug!(
            schema_id = %id,
            version = output.schema_version().unwrap_or("latest"),
            "Schema resolved"
        );
        Ok(Arc::new(document))
    }

    fn registry_type(&self) -> RegistryType {
        RegistryType::Cloud
    }
}
