//! Resolved schema documents.
//!
//! Registries hand back either OpenAPI 3 documents (EventBridge Schemas and
//! most Apicurio artifacts) or plain JSON Schemas. `SchemaDocument` keeps the
//! document as fetched and derives the JSON Schema actually used to validate
//! event details.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::SchemaReference;
use crate::domain::foundation::ValidationError;

/// Component holding the EventBridge envelope in discovered schemas.
const AWS_EVENT_COMPONENT: &str = "AWSEvent";
const COMPONENT_REF_PREFIX: &str = "#/components/schemas/";

static EMPTY_SCHEMA: Value = Value::Null;

/// A schema resolved from a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    reference: SchemaReference,
    raw: Value,
    validation_schema: Value,
    fingerprint: String,
}

impl SchemaDocument {
    /// Builds a document from registry content that is either JSON or YAML.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the content is neither, or if it is not a
    /// usable schema (see [`SchemaDocument::from_value`]).
    pub fn parse(reference: SchemaReference, content: &str) -> Result<Self, ValidationError> {
        let raw = match serde_json::from_str::<Value>(content) {
            Ok(value) => value,
            Err(json_err) => serde_yaml::from_str::<Value>(content).map_err(|_| {
                ValidationError::invalid_format(
                    "schema_content",
                    format!("not JSON or YAML: {}", json_err),
                )
            })?,
        };
        Self::from_value(reference, raw)
    }

    /// Builds a document from an already parsed value.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the value is not a JSON object (or boolean
    /// schema).
    pub fn from_value(reference: SchemaReference, raw: Value) -> Result<Self, ValidationError> {
        let validation_schema = extract_validation_schema(&raw)?;
        let fingerprint = fingerprint(&raw);
        Ok(Self {
            reference,
            raw,
            validation_schema,
            fingerprint,
        })
    }

    pub fn reference(&self) -> &SchemaReference {
        &self.reference
    }

    /// The document exactly as the registry returned it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// JSON Schema used to validate event details.
    pub fn validation_schema(&self) -> &Value {
        &self.validation_schema
    }

    /// Hex SHA-256 of the raw document. Equal documents share a fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Schema name used to tag outgoing events.
    pub fn name(&self) -> &str {
        self.reference.schema_id().name()
    }

    /// True when the document constrains nothing (an OpenAPI document
    /// without component schemas, or an empty schema).
    pub fn is_permissive(&self) -> bool {
        match &self.validation_schema {
            Value::Object(map) => map.is_empty(),
            Value::Bool(accept) => *accept,
            _ => false,
        }
    }
}

fn fingerprint(raw: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn extract_validation_schema(raw: &Value) -> Result<Value, ValidationError> {
    let doc = match raw {
        Value::Object(doc) => doc,
        Value::Bool(_) => return Ok(raw.clone()),
        _ => {
            return Err(ValidationError::invalid_format(
                "schema_content",
                "schema document must be a JSON object",
            ))
        }
    };

    let components = doc.get("components");
    let schemas = components
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object);

    match (components, schemas) {
        (Some(components), Some(schemas)) if !schemas.is_empty() => {
            let main = select_main_component(schemas);
            Ok(with_components(main, components))
        }
        // OpenAPI document without component schemas constrains nothing.
        _ if doc.contains_key("openapi") => Ok(Value::Object(Map::new())),
        _ => Ok(raw.clone()),
    }
}

/// The detail schema referenced by `AWSEvent`, else the first component.
fn select_main_component(schemas: &Map<String, Value>) -> &Value {
    let detail_component = schemas
        .get(AWS_EVENT_COMPONENT)
        .and_then(|event| event.pointer("/properties/detail/$ref"))
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix(COMPONENT_REF_PREFIX))
        .and_then(|name| schemas.get(name));

    match detail_component {
        Some(schema) => schema,
        // Non-empty checked by the caller.
        None => schemas.values().next().unwrap_or(&EMPTY_SCHEMA),
    }
}

/// Carries `components` along so `#/components/...` refs keep resolving.
fn with_components(main: &Value, components: &Value) -> Value {
    match main {
        Value::Object(map) => {
            let mut schema = map.clone();
            schema
                .entry("components")
                .or_insert_with(|| components.clone());
            Value::Object(schema)
        }
        other => other.clone(),
    }
}
