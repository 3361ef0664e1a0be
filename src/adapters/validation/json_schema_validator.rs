//! JSON Schema Validator - Implementation of SchemaValidator.
//!
//! Compiles each document's validation schema with the `jsonschema` crate
//! and keeps the compiled form keyed by document fingerprint, so a schema
//! shared by many producers or polls is compiled once.

use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::schema::SchemaDocument;
use crate::ports::{SchemaValidationError, SchemaValidator};

/// JSON Schema-based validator implementation.
///
/// # Thread Safety
///
/// This struct is `Send + Sync` and can be shared across producers and
/// consumers.
#[derive(Default)]
pub struct JsonSchemaValidator {
    compiled: RwLock<HashMap<String, Arc<JSONSchema>>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct schemas compiled so far.
    pub fn compiled_count(&self) -> usize {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn compiled_for(&self, schema: &SchemaDocument) -> Result<Arc<JSONSchema>, SchemaValidationError> {
        if let Some(compiled) = self
            .compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(schema.fingerprint())
        {
            return Ok(Arc::clone(compiled));
        }

        let compiled = JSONSchema::compile(schema.validation_schema()).map_err(|e| {
            SchemaValidationError::UnusableSchema {
                reason: format!("{} does not compile: {}", schema.reference(), e),
            }
        })?;
        let compiled = Arc::new(compiled);

        self.compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(schema.fingerprint().to_string())
            .or_insert_with(|| Arc::clone(&compiled));

        Ok(compiled)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(
        &self,
        schema: &SchemaDocument,
        payload: &Value,
    ) -> Result<(), SchemaValidationError> {
        if schema.is_permissive() {
            return Ok(());
        }

        let compiled = self.compiled_for(schema)?;
        let result = compiled.validate(payload);
        let Err(errors) = result else {
            return Ok(());
        };

        let violations: Vec<SchemaValidationError> = errors
            .map(|error| {
                let path = pointer(&error.instance_path.to_string());
                match &error.kind {
                    ValidationErrorKind::Required { property } => {
                        let property = property
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| property.to_string());
                        SchemaValidationError::MissingRequired {
                            field: join_pointer(&path, &property),
                        }
                    }
                    _ => SchemaValidationError::InvalidField {
                        field: path,
                        message: error.to_string(),
                    },
                }
            })
            .collect();

        match SchemaValidationError::from_violations(violations) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Normalizes an instance path so the payload root reads as `/`.
fn pointer(instance_path: &str) -> String {
    if instance_path.is_empty() {
        "/".to_string()
    } else {
        instance_path.to_string()
    }
}

fn join_pointer(parent: &str, property: &str) -> String {
    if parent == "/" {
        format!("/{}", property)
    } else {
        format!("{}/{}", parent, property)
    }
}
