//! Core module containing fundamental traits and types of the loader

pub mod error;
pub mod field;
pub mod model;
pub mod path;
pub mod schema;
pub mod service;

pub use error::{LoaderError, Result};
pub use field::{RecordKey, Row};
pub use model::{
    KeyRequirement, ModelDefinition, ModelRegistry, PivotTable, RelationDefinition,
    RelationDescriptor, RelationKind,
};
pub use path::{PathSegment, ResponsePath};
pub use schema::{Directive, FieldDefinition, TypeDefinition, TypeRegistry};
pub use service::{DataSource, FetchQuery};
