//! Schema references: which backend, where it lives and which schema.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Separator between a schema name and its optional version.
pub const VERSION_SEPARATOR: char = ':';

/// Kind of schema registry backend.
///
/// Selected by configuration tag; `apicurio`/`http` and
/// `eventbridge`/`cloud` are accepted spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryType {
    /// Remote HTTP registry speaking the Apicurio v2 REST API.
    #[serde(rename = "apicurio", alias = "http")]
    Http,
    /// AWS EventBridge Schemas.
    #[serde(rename = "eventbridge", alias = "cloud")]
    Cloud,
}

impl RegistryType {
    /// Canonical configuration tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryType::Http => "apicurio",
            RegistryType::Cloud => "eventbridge",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apicurio" | "http" => Ok(RegistryType::Http),
            "eventbridge" | "cloud" => Ok(RegistryType::Cloud),
            other => Err(ValidationError::invalid_format(
                "registry_type",
                format!("Unsupported registry type: {}", other),
            )),
        }
    }
}

/// Where a registry lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryLocation {
    /// HTTP registry base URL and artifact group.
    Url { base_url: String, group: String },
    /// Cloud schema service region and registry name.
    Region { region: String, registry_name: String },
}

impl RegistryLocation {
    /// Backend kind implied by this location.
    pub fn registry_type(&self) -> RegistryType {
        match self {
            RegistryLocation::Url { .. } => RegistryType::Http,
            RegistryLocation::Region { .. } => RegistryType::Cloud,
        }
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryLocation::Url { base_url, group } => write!(f, "{}#{}", base_url, group),
            RegistryLocation::Region {
                region,
                registry_name,
            } => write!(f, "{}/{}", region, registry_name),
        }
    }
}

/// A schema name with an optional version, written `name` or `name:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaId {
    name: String,
    version: Option<String>,
}

impl SchemaId {
    /// Parses `name` or `name:version`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the name or an explicit version is empty.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let (name, version) = match raw.rsplit_once(VERSION_SEPARATOR) {
            Some((name, version)) => {
                if version.trim().is_empty() {
                    return Err(ValidationError::empty_field("schema_version"));
                }
                (name.trim(), Some(version.trim().to_string()))
            }
            None => (raw, None),
        };

        if name.is_empty() {
            return Err(ValidationError::empty_field("schema_name"));
        }

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// Schema name without version.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit version, `None` meaning latest.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}{}{}", self.name, VERSION_SEPARATOR, version),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for SchemaId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Fully qualified pointer to one schema in one registry. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaReference {
    location: RegistryLocation,
    schema_id: SchemaId,
}

impl SchemaReference {
    pub fn new(location: RegistryLocation, schema_id: SchemaId) -> Self {
        Self {
            location,
            schema_id,
        }
    }

    pub fn registry_type(&self) -> RegistryType {
        self.location.registry_type()
    }

    pub fn location(&self) -> &RegistryLocation {
        &self.location
    }

    pub fn schema_id(&self) -> &SchemaId {
        &self.schema_id
    }
}

impl fmt::Display for SchemaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            self.registry_type(),
            self.location,
            self.schema_id
        )
    }
}
