//! Configuration loading and management

use crate::core::error::{ConfigError, Result};
use crate::core::{ModelDefinition, TypeDefinition};
use crate::registry::{DEFAULT_WRAPPER_SUFFIXES, ModelCatalog, SchemaRegistry};
use serde::{Deserialize, Serialize};

/// Planner behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Project only the planned columns; when disabled every fetch selects
    /// all columns
    #[serde(default = "default_true")]
    pub optimized_selects: bool,

    /// Fail with `RelationNotFound` when a relation directive names a
    /// relation the model does not have, instead of skipping its key column
    #[serde(default)]
    pub strict_relations: bool,

    /// Suffixes stripped from pagination wrapper type names
    #[serde(default = "default_wrapper_suffixes")]
    pub wrapper_suffixes: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_wrapper_suffixes() -> Vec<String> {
    DEFAULT_WRAPPER_SUFFIXES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            optimized_selects: true,
            strict_relations: false,
            wrapper_suffixes: default_wrapper_suffixes(),
        }
    }
}

/// Complete configuration: schema types, models and planner settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Output types of the schema (the root type is `Query`)
    #[serde(default)]
    pub types: Vec<TypeDefinition>,

    /// Data models and their relations
    #[serde(default)]
    pub models: Vec<ModelDefinition>,

    #[serde(default)]
    pub planner: PlannerConfig,
}

impl LoaderConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Merge several configurations
    ///
    /// Types and models are keyed by name; a later definition replaces an
    /// earlier one. Planner settings come from the last configuration.
    pub fn merge(configs: Vec<LoaderConfig>) -> Self {
        let mut merged = LoaderConfig::default();

        for config in configs {
            for definition in config.types {
                merged.types.retain(|t| t.name() != definition.name());
                merged.types.push(definition);
            }
            for model in config.models {
                merged.models.retain(|m| m.name != model.name);
                merged.models.push(model);
            }
            merged.planner = config.planner;
        }

        merged
    }

    /// Build the type registry
    pub fn schema_registry(&self) -> SchemaRegistry {
        SchemaRegistry::new(self.types.iter().cloned())
            .with_wrapper_suffixes(self.planner.wrapper_suffixes.iter().cloned())
    }

    /// Build the model catalog, validating relations
    pub fn model_catalog(&self) -> Result<ModelCatalog> {
        ModelCatalog::new(self.models.iter().cloned())
    }
}
