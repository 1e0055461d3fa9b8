use serde::{Deserialize, Deserializer, Serialize};

use super::ResolutionError;
use crate::address::TargetMetadata;
use crate::eval::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryType {
    AddressHandler,
    FunctionsLibrary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provides {
    pub address_target: Option<String>,
    pub handler_function: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryMetadata {
    #[serde(default)]
    pub interpreter_handles_interpolation: bool,
    pub description: Option<String>,
}

/// The self-description every module exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDescriptor {
    #[serde(default, deserialize_with = "string_like")]
    pub name: String,
    #[serde(default, deserialize_with = "string_like")]
    pub version: String,
    #[serde(rename = "type")]
    pub kind: Option<LibraryType>,
    #[serde(default)]
    pub provides: Provides,
    /// Identifier → version requirement. Only the identifiers are acted on.
    #[serde(default)]
    pub dependencies: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub library_metadata: LibraryMetadata,
}

fn string_like<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl LibraryDescriptor {
    pub fn new(name: &str, version: &str, kind: LibraryType) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            kind: Some(kind),
            provides: Provides::default(),
            dependencies: serde_json::Map::new(),
            library_metadata: LibraryMetadata::default(),
        }
    }

    pub fn with_address_target(mut self, target: &str) -> Self {
        self.provides.address_target = Some(target.to_string());
        self
    }

    pub fn with_dependency(mut self, identifier: &str) -> Self {
        self.dependencies.insert(
            identifier.to_string(),
            serde_json::Value::String("*".to_string()),
        );
        self
    }

    pub fn interpolating(mut self) -> Self {
        self.library_metadata.interpreter_handles_interpolation = true;
        self
    }

    /// Reads a descriptor out of a script value: a map, or a string holding JSON.
    pub fn from_value(identifier: &str, value: Value) -> Result<Self, ResolutionError> {
        let json = match value {
            Value::String(text) => serde_json::from_str(&text).map_err(|e| invalid(identifier, e))?,
            other => other.to_json(),
        };
        serde_json::from_value(json).map_err(|e| invalid(identifier, e))
    }

    pub fn kind(&self) -> LibraryType {
        self.kind.unwrap_or(LibraryType::FunctionsLibrary)
    }

    pub fn validate(&self, identifier: &str) -> Result<(), ResolutionError> {
        if self.name.trim().is_empty() {
            return Err(invalid(identifier, "missing name"));
        }
        if self.version.trim().is_empty() {
            return Err(invalid(identifier, "missing version"));
        }
        match self.kind {
            None => Err(invalid(identifier, "missing type")),
            Some(LibraryType::AddressHandler) if self.provides.address_target.is_none() => Err(
                invalid(identifier, "address-handler must provide addressTarget"),
            ),
            _ => Ok(()),
        }
    }

    pub fn target_metadata(&self) -> TargetMetadata {
        TargetMetadata {
            library_name: Some(self.name.clone()),
            version: Some(self.version.clone()),
            interpreter_handles_interpolation: self
                .library_metadata
                .interpreter_handles_interpolation,
        }
    }
}

fn invalid(identifier: &str, message: impl ToString) -> ResolutionError {
    ResolutionError::InvalidDescriptor {
        identifier: identifier.to_string(),
        message: message.to_string(),
    }
}
