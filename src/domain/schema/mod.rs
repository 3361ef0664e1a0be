//! Schema module - registry references and resolved schema documents.

mod document;
mod reference;

pub use document::SchemaDocument;
pub use reference::{RegistryLocation, RegistryType, SchemaId, SchemaReference, VERSION_SEPARATOR};
