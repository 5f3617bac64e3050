//! Registries backing the planner: schema types and models
//!
//! Both are built from [`LoaderConfig`](crate::config::LoaderConfig) but only
//! consumed through the [`TypeRegistry`](crate::core::TypeRegistry) and
//! [`ModelRegistry`](crate::core::ModelRegistry) traits, so callers may plug
//! in their own.

pub mod models;
pub mod types;

pub use models::ModelCatalog;
pub use types::{DEFAULT_WRAPPER_SUFFIXES, SchemaRegistry};
