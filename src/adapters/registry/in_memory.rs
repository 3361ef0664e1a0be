//! In-memory schema registry for tests and offline runs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::schema::{
    RegistryLocation, RegistryType, SchemaDocument, SchemaId, SchemaReference,
};
use crate::ports::{RegistryError, SchemaRegistry};

/// Registry holding documents registered up front.
///
/// Features:
/// - Exact lookup by `name` or `name:version`
/// - Resolve call counting for cache assertions
/// - Simulated outages via [`set_unavailable`](Self::set_unavailable)
pub struct InMemorySchemaRegistry {
    documents: RwLock<HashMap<String, Arc<SchemaDocument>>>,
    resolves: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            resolves: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Registers `raw` under `schema_id`, replacing any previous document.
    pub fn register(&self, schema_id: &str, raw: Value) -> Result<(), RegistryError> {
        let id = SchemaId::parse(schema_id).map_err(|e| RegistryError::invalid(schema_id, e))?;
        let reference = SchemaReference::new(Self::location(), id.clone());
        let document = SchemaDocument::from_value(reference, raw)
            .map_err(|e| RegistryError::invalid(id.to_string(), e))?;

        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::new(document));
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_schema(self, schema_id: &str, raw: Value) -> Result<Self, RegistryError> {
        self.register(schema_id, raw)?;
        Ok(self)
    }

    /// Makes every resolve fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of resolve calls received, failed ones included.
    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    fn location() -> RegistryLocation {
        RegistryLocation::Url {
            base_url: "memory://schemas".to_string(),
            group: "default".to_string(),
        }
    }
}

impl Default for InMemorySchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn resolve(&self, schema_id: &str) -> Result<Arc<SchemaDocument>, RegistryError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable(
                "in-memory registry switched off".to_string(),
            ));
        }

        let id = SchemaId::parse(schema_id).map_err(|e| RegistryError::invalid(schema_id, e))?;
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id.to_string())
            .cloned()
            .ok_or_else(|| RegistryError::not_found(id.to_string()))
    }

    fn registry_type(&self) -> RegistryType {
        RegistryType::Http
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolves_registered_schema() {
        let registry = InMemorySchemaRegistry::new()
            .with_schema("Orders", json!({"type": "object"}))
            .unwrap();
        let document = registry.resolve("Orders").await.unwrap();
        assert_eq!(document.name(), "Orders");
        assert_eq!(registry.resolve_count(), 1);
    }

    #[tokio::test]
    async fn versions_are_distinct_entries() {
        let registry = InMemorySchemaRegistry::new()
            .with_schema("Orders:2", json!({"type": "object"}))
            .unwrap();
        assert!(registry.resolve("Orders:2").await.is_ok());
        assert_eq!(
            registry.resolve("Orders").await.unwrap_err(),
            RegistryError::not_found("Orders")
        );
    }

    #[tokio::test]
    async fn repeated_resolves_are_structurally_identical() {
        let registry = InMemorySchemaRegistry::new()
            .with_schema("Orders", json!({"type": "object", "required": ["id"]}))
            .unwrap();
        let first = registry.resolve("Orders").await.unwrap();
        let second = registry.resolve("Orders").await.unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.validation_schema(), second.validation_schema());
    }

    #[tokio::test]
    async fn outage_is_reported_as_unavailable() {
        let registry = InMemorySchemaRegistry::new();
        registry.set_unavailable(true);
        let err = registry.resolve("Orders").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn invalid_document_is_rejected_at_registration() {
        let registry = InMemorySchemaRegistry::new();
        let err = registry.register("Orders", json!(42)).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }
}
