//! Type registry built from configured type definitions

use crate::core::schema::{TypeDefinition, TypeRegistry};
use std::collections::HashMap;

/// Wrapper suffixes stripped by default (`PostPaginator` -> `Post`)
pub const DEFAULT_WRAPPER_SUFFIXES: &[&str] = &["SimplePaginator", "Paginator"];

/// Registry of schema types
///
/// Resolves type names to definitions and reduces pagination wrapper names
/// to their item type.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeDefinition>,
    /// Longest first, so `SimplePaginator` wins over `Paginator`
    wrapper_suffixes: Vec<String>,
}

impl SchemaRegistry {
    /// Create a registry with the default wrapper suffixes
    pub fn new(types: impl IntoIterator<Item = TypeDefinition>) -> Self {
        let mut registry = Self {
            types: HashMap::new(),
            wrapper_suffixes: Vec::new(),
        };
        for definition in types {
            registry.register(definition);
        }
        registry.with_wrapper_suffixes(DEFAULT_WRAPPER_SUFFIXES.iter().map(|s| s.to_string()))
    }

    /// Replace the wrapper suffixes
    pub fn with_wrapper_suffixes(mut self, suffixes: impl IntoIterator<Item = String>) -> Self {
        let mut suffixes: Vec<String> = suffixes.into_iter().collect();
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
        suffixes.dedup();
        self.wrapper_suffixes = suffixes;
        self
    }

    /// Register (or replace) a type definition
    pub fn register(&mut self, definition: TypeDefinition) {
        self.types.insert(definition.name().to_string(), definition);
    }

    /// All registered type names
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(|s| s.as_str()).collect()
    }
}

impl TypeRegistry for SchemaRegistry {
    fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    fn reduce_wrapper(&self, name: &str) -> String {
        self.wrapper_suffixes
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix.as_str()))
            .filter(|item| !item.is_empty())
            .unwrap_or(name)
            .to_string()
    }
}
