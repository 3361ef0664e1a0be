//! SchemaRegistry port - Interface for resolving schema documents.
//!
//! Producers and consumers resolve schemas by identifier without knowing
//! whether the backend is a remote HTTP registry or the cloud schema service.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::schema::{RegistryType, SchemaDocument};

/// Port for resolving schemas by identifier.
///
/// Implementations must:
/// - Accept `name` or `name:version` identifiers (latest when unversioned)
/// - Return `SchemaNotFound` only when the backend positively reports the
///   schema missing
/// - Report transport and server failures as `Unavailable`
/// - Be safe to call concurrently
///
/// # Example
///
/// ```ignore
/// let schema = registry.resolve("FileUploaded-v0").await?;
/// validator.validate(&schema, &detail)?;
/// ```
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Resolve a schema identifier to its document.
    async fn resolve(&self, schema_id: &str) -> Result<Arc<SchemaDocument>, RegistryError>;

    /// Backend kind, for logging.
    fn registry_type(&self) -> RegistryType;
}

/// Errors from schema resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Schema not found: {schema_id}")]
    SchemaNotFound { schema_id: String },

    #[error("Schema registry unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid schema '{schema_id}': {reason}")]
    InvalidSchema { schema_id: String, reason: String },

    #[error("Schema registry misconfigured: {0}")]
    Misconfigured(String),
}

impl RegistryError {
    pub fn not_found(schema_id: impl Into<String>) -> Self {
        RegistryError::SchemaNotFound {
            schema_id: schema_id.into(),
        }
    }

    pub fn invalid(schema_id: impl Into<String>, reason: impl ToString) -> Self {
        RegistryError::InvalidSchema {
            schema_id: schema_id.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures worth retrying later (transport, server errors).
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn SchemaRegistry) {}

    #[test]
    fn only_unavailable_is_transient() {
        assert!(RegistryError::Unavailable("timeout".into()).is_transient());
        assert!(!RegistryError::not_found("Orders").is_transient());
        assert!(!RegistryError::invalid("Orders", "not an object").is_transient());
        assert!(!RegistryError::Misconfigured("bad url".into()).is_transient());
    }

    #[test]
    fn not_found_names_schema() {
        assert_eq!(
            RegistryError::not_found("FileUploaded-v0").to_string(),
            "Schema not found: FileUploaded-v0"
        );
    }
}
