//! Schema registry adapters.
//!
//! - `HttpSchemaRegistry` - Apicurio-compatible REST registry
//! - `CloudSchemaRegistry` - AWS EventBridge Schemas
//! - `CachingSchemaRegistry` - bounded per-instance cache in front of either
//! - `InMemorySchemaRegistry` - offline registry for tests

mod cached;
mod cloud;
mod http;
mod in_memory;

pub use cached::{CachingSchemaRegistry, DEFAULT_CACHE_CAPACITY};
pub use cloud::CloudSchemaRegistry;
pub use http::HttpSchemaRegistry;
pub use in_memory::InMemorySchemaRegistry;

use std::sync::Arc;
use tracing::info;

use crate::config::{AwsConfig, RegistryConfig};
use crate::domain::schema::RegistryType;
use crate::ports::{RegistryError, SchemaRegistry};

/// Builds the registry selected by `config.registry_type`, cached unless
/// `cache_capacity` is zero.
///
/// # Errors
///
/// Returns `RegistryError::Misconfigured` if the HTTP registry cannot be set up.
pub async fn connect_registry(
    config: &RegistryConfig,
    aws: &AwsConfig,
) -> Result<Arc<dyn SchemaRegistry>, RegistryError> {
    let registry: Arc<dyn SchemaRegistry> = match config.registry_type {
        RegistryType::Http => Arc::new(HttpSchemaRegistry::from_config(config)?),
        RegistryType::Cloud => {
            let region = config.region.as_deref().unwrap_or(&aws.region);
            Arc::new(CloudSchemaRegistry::connect(aws, region, config.registry_name.clone()).await)
        }
    };

    info!(
        registry_type = %config.registry_type,
        cache_capacity = config.cache_capacity,
        "Schema registry configured"
    );

    if config.cache_capacity == 0 {
        return Ok(registry);
    }
    Ok(Arc::new(CachingSchemaRegistry::new(registry, config.cache_capacity)))
}
