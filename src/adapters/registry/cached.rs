//! Caching decorator for schema registries.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::schema::{RegistryType, SchemaDocument};
use crate::ports::{RegistryError, SchemaRegistry};

/// Default number of schemas kept per registry instance.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Keeps resolved documents for the lifetime of the instance.
///
/// Bounded: once `capacity` schemas are cached the oldest entry is evicted.
/// Failed resolutions are never cached, so a registry outage heals on the
/// next call.
pub struct CachingSchemaRegistry {
    inner: Arc<dyn SchemaRegistry>,
    capacity: usize,
    cache: RwLock<SchemaCache>,
}

#[derive(Default)]
struct SchemaCache {
    entries: HashMap<String, Arc<SchemaDocument>>,
    order: VecDeque<String>,
}

impl SchemaCache {
    fn insert(&mut self, key: String, document: Arc<SchemaDocument>, capacity: usize) {
        while self.order.len() >= capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, document);
    }
}

impl CachingSchemaRegistry {
    pub fn new(inner: Arc<dyn SchemaRegistry>, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: RwLock::new(SchemaCache::default()),
        }
    }

    pub fn with_default_capacity(inner: Arc<dyn SchemaRegistry>) -> Self {
        Self::new(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Number of cached schemas.
    pub async fn len(&self) -> usize {
        self.cache.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every cached schema.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.entries.clear();
        cache.order.clear();
    }
}

#[async_trait]
impl SchemaRegistry for CachingSchemaRegistry {
    async fn resolve(&self, schema_id: &str) -> Result<Arc<SchemaDocument>, RegistryError> {
        let key = schema_id.trim().to_string();

        if let Some(document) = self.cache.read().await.entries.get(&key) {
            debug!(schema_id = %key, "Schema cache hit");
            return Ok(Arc::clone(document));
        }

        let document = self.inner.resolve(schema_id).await?;

        let mut cache = self.cache.write().await;
        // Another caller may have filled the slot while we were resolving.
        if let Some(existing) = cache.entries.get(&key) {
            return Ok(Arc::clone(existing));
        }
        cache.insert(key, Arc::clone(&document), self.capacity);
        Ok(document)
    }

    fn registry_type(&self) -> RegistryType {
        self.inner.registry_type()
    }
}
