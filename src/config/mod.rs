//! Configuration loading and management

use crate::core::entity::EntityDefinition;
use crate::core::error::{ConfigError, NavResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Session key of the persisted context chain
pub const DEFAULT_SESSION_KEY: &str = "session.current.context";

/// Declarative entity model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// List of entity definitions
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
}

impl ModelConfig {
    /// Load the model from a YAML (or JSON) file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                file: Some(path.display().to_string()),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load the model from a YAML string
    pub fn from_yaml_str(yaml: &str) -> NavResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load the model from a JSON string
    pub fn from_json_str(json: &str) -> NavResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Merge another model into this one
    ///
    /// An entity defined in both keeps the definition of `other`.
    pub fn merge(mut self, other: ModelConfig) -> Self {
        for definition in other.entities {
            match self
                .entities
                .iter_mut()
                .find(|existing| existing.name.front == definition.name.front)
            {
                Some(existing) => *existing = definition,
                None => self.entities.push(definition),
            }
        }
        self
    }

    pub fn entity(&self, front: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|def| def.name.front == front)
    }
}

/// Settings of the navigation store and gateways
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Session key the context chain is persisted under
    pub session_key: String,

    /// Query parameter carrying the stack position
    pub context_param: String,

    /// Grant every security function
    pub disable_security: bool,

    /// Base url of the backend, with a trailing slash
    pub backend_url: Option<String>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            session_key: DEFAULT_SESSION_KEY.to_string(),
            context_param: crate::context::DEFAULT_CONTEXT_PARAM.to_string(),
            disable_security: false,
            backend_url: None,
        }
    }
}

impl NavigatorConfig {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> NavResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load settings from a YAML string, missing keys taking their default
    pub fn from_yaml_str(yaml: &str) -> NavResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
