//! Executor driving one resolution pass over an operation
//!
//! The executor is split into several sub-modules:
//! - `core`: pass orchestration and the FIFO read queue
//! - `query_executor`: root `find`/`all` resolution
//! - `field_resolver`: object completion and relation registration
//! - `host`: registries, planner and data source shared by every request
//! - `selection` / `response`: operation input and response output
//! - `graphql`: GraphQL documents as operations (feature `graphql`)

mod core;
mod field_resolver;
pub mod host;
mod query_executor;
pub mod response;
pub mod selection;

#[cfg(feature = "graphql")]
pub mod graphql;

pub use core::Executor;
pub use field_resolver::Resolved;
pub use host::LoaderHost;
pub use query_executor::ROOT_TYPE;
pub use response::{FieldError, Response};
pub use selection::{FieldNode, Operation};

#[cfg(feature = "graphql")]
pub use graphql::parse_operation;
