//! # This-Loader
//!
//! Projection planning and batched relation loading for declarative graph
//! queries over a relational data source.
//!
//! ## Features
//!
//! - **Projection Planning**: fetch only the columns a node's selection needs,
//!   including the hidden key columns relation loaders depend on
//! - **Batched Relation Loading**: sibling records resolving the same relation
//!   path share one bulk fetch instead of one query each (no N+1)
//! - **Two-Phase Deferred Values**: registering a load never suspends; the
//!   first read flushes the batch
//! - **Configuration-Based**: describe schema types and models in YAML
//! - **Typed Errors**: every failure carries a stable error code and is
//!   attached to the response path that produced it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_loader::prelude::*;
//!
//! let config = LoaderConfig::from_yaml_file("fixtures/blog.yaml")?;
//! let source = InMemoryDataSource::new();
//! source.insert("User", json!({ "id": 1, "name": "Ada" }))?;
//! source.insert("Post", json!({ "id": 1, "title": "Hello", "author_id": 1 }))?;
//!
//! let host = LoaderHost::from_config(&config, Arc::new(source))?;
//! let executor = Executor::new(Arc::new(host));
//!
//! let operation = Operation::new().select(
//!     FieldNode::new("posts")
//!         .fields(["title"])
//!         .select(FieldNode::new("author").fields(["name"])),
//! );
//! let response = executor.execute(&operation).await;
//! ```

pub mod batch;
pub mod config;
pub mod core;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod select;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        DataSource, Directive, FetchQuery, FieldDefinition, LoaderError, ModelDefinition,
        ModelRegistry, RecordKey, RelationDescriptor, RelationKind, ResponsePath, Row,
        TypeDefinition, TypeRegistry,
    };

    // === Planning ===
    pub use crate::registry::{ModelCatalog, SchemaRegistry};
    pub use crate::select::{ProjectionPlan, SelectionPlanner};

    // === Batching ===
    pub use crate::batch::{Batch, BatchLoader, BatchRegistry, LoaderKind, RelationBatchLoader};
    pub use crate::scheduler::{DeferredScheduler, DeferredValue};

    // === Executor ===
    pub use crate::executor::{Executor, FieldError, FieldNode, LoaderHost, Operation, Response};

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::{FetchRecord, InMemoryDataSource};

    // === Config ===
    pub use crate::config::{LoaderConfig, PlannerConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
