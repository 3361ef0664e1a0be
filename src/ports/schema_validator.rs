//! Schema Validator Port - Event payload validation interface.
//!
//! This port defines the contract for validating event payloads against a
//! resolved schema document. The application depends on this trait, while
//! adapters (like JsonSchemaValidator) provide the implementation.

use serde_json::Value;
use thiserror::Error;

use crate::domain::schema::SchemaDocument;

/// Port for validating payloads against resolved schemas.
///
/// # Contract
///
/// Implementations must:
/// - Validate against `SchemaDocument::validation_schema`
/// - Report every violated field, not just the first
/// - Never mutate the payload
///
/// # Usage
///
/// ```rust,ignore
/// let schema = registry.resolve("FileUploaded-v0").await?;
/// validator.validate(&schema, &detail)?;
/// ```
pub trait SchemaValidator: Send + Sync {
    /// Validate payload against the document's validation schema.
    ///
    /// Returns `Ok(())` if valid, `Err` listing the violations if not.
    fn validate(&self, schema: &SchemaDocument, payload: &Value)
        -> Result<(), SchemaValidationError>;
}

/// Errors that can occur during schema validation.
///
/// Field names are JSON pointers into the payload (`/data/file_id`), with
/// `/` standing for the payload root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaValidationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for field {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Schema cannot be used for validation: {reason}")]
    UnusableSchema { reason: String },

    #[error("Validation errors: {}", join_messages(.0))]
    Multiple(Vec<SchemaValidationError>),
}

impl SchemaValidationError {
    /// Collapses a list of violations: one stays as-is, more become `Multiple`.
    ///
    /// Returns `None` for an empty list.
    pub fn from_violations(mut violations: Vec<SchemaValidationError>) -> Option<Self> {
        match violations.len() {
            0 => None,
            1 => violations.pop(),
            _ => Some(SchemaValidationError::Multiple(violations)),
        }
    }

    /// Every violated field, in report order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            SchemaValidationError::MissingRequired { field }
            | SchemaValidationError::InvalidField { field, .. } => vec![field.as_str()],
            SchemaValidationError::UnusableSchema { .. } => Vec::new(),
            SchemaValidationError::Multiple(errors) => {
                errors.iter().flat_map(|e| e.fields()).collect()
            }
        }
    }

    /// Returns true if this error contains multiple validation failures.
    pub fn is_multiple(&self) -> bool {
        matches!(self, SchemaValidationError::Multiple(_))
    }

    /// Get the count of validation errors.
    pub fn error_count(&self) -> usize {
        match self {
            SchemaValidationError::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

fn join_messages(errors: &[SchemaValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
