//! Validation adapters - Implementations of SchemaValidator.

mod json_schema_validator;

pub use json_schema_validator::JsonSchemaValidator;
