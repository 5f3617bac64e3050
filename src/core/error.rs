//! Typed error handling for the loader
//!
//! Every failure the planner, the batch loader or the executor can produce is
//! represented by [`LoaderError`]. Errors are grouped by category so callers
//! can match on the specific case instead of inspecting strings.
//!
//! # Error Categories
//!
//! - [`SchemaError`]: a type, field, model or relation cannot be resolved
//! - [`BatchError`]: misuse of a batch or a failed bulk fetch
//! - [`QueryError`]: a single-field query returned an unexpected shape
//! - [`ConfigError`]: configuration loading and validation
//! - [`StorageError`]: failures reported by a data source
//!
//! All errors are `Clone`: a failed bulk fetch is delivered to every field
//! waiting on the batch.
//!
//! # Example
//!
//! ```rust,ignore
//! match planner.plan("Post", &["title"], "Post") {
//!     Ok(plan) => println!("{:?}", plan),
//!     Err(LoaderError::Schema(SchemaError::UnknownType { type_name })) => {
//!         eprintln!("no such type: {}", type_name);
//!     }
//!     Err(e) => eprintln!("{} ({})", e, e.error_code()),
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;

/// The main error type of the loader
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// Schema and model resolution errors
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Batch lifecycle and bulk fetch errors
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Query shape errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Data source errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error payload attached to a response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LoaderError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            LoaderError::Schema(e) => e.error_code(),
            LoaderError::Batch(e) => e.error_code(),
            LoaderError::Query(e) => e.error_code(),
            LoaderError::Config(_) => "CONFIG_ERROR",
            LoaderError::Storage(_) => "STORAGE_ERROR",
            LoaderError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error is fatal for the whole request rather than a single field
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            LoaderError::Schema(SchemaError::UnknownType { .. })
                | LoaderError::Schema(SchemaError::EmptyUnion { .. })
                | LoaderError::Query(QueryError::InvalidDocument { .. })
                | LoaderError::Config(_)
                | LoaderError::Internal(_)
        )
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            LoaderError::Schema(SchemaError::RelationNotFound { model, relation }) => {
                Some(serde_json::json!({ "model": model, "relation": relation }))
            }
            LoaderError::Batch(BatchError::FetchFailed { batch, .. })
            | LoaderError::Batch(BatchError::AlreadyFlushed { batch }) => {
                Some(serde_json::json!({ "batch": batch }))
            }
            LoaderError::Query(QueryError::MultipleResults { model, count }) => {
                Some(serde_json::json!({ "model": model, "count": count }))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// A type, field, model or relation could not be resolved
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Type '{type_name}' is not defined in the schema")]
    UnknownType { type_name: String },

    #[error("Union '{type_name}' has no member types")]
    EmptyUnion { type_name: String },

    #[error("Field '{field}' is not defined on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    #[error("Model '{model}' is not registered")]
    UnknownModel { model: String },

    #[error("Relation '{relation}' does not exist on model '{model}'")]
    RelationNotFound { model: String, relation: String },

    #[error("Field '{field}' has no resolver directive")]
    MissingResolver { field: String },
}

impl SchemaError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SchemaError::RelationNotFound { .. } => "RELATION_NOT_FOUND",
            SchemaError::MissingResolver { .. } => "MISSING_RESOLVER",
            _ => "SCHEMA_INCONSISTENCY",
        }
    }
}

// =============================================================================
// Batch Errors
// =============================================================================

/// Errors raised by batches
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    /// A load was registered after the batch flushed (caller ordering bug)
    #[error("Batch '{batch}' has already been flushed and cannot accept new loads")]
    AlreadyFlushed { batch: String },

    /// The bulk fetch behind a flush failed
    #[error("Bulk fetch for batch '{batch}' failed: {message}")]
    FetchFailed { batch: String, message: String },
}

impl BatchError {
    pub fn error_code(&self) -> &'static str {
        match self {
            BatchError::AlreadyFlushed { .. } => "INVALID_BATCH_USE",
            BatchError::FetchFailed { .. } => "BATCH_FETCH_FAILURE",
        }
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// A query returned something its field cannot represent
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("The query on '{model}' returned {count} results where at most one was expected")]
    MultipleResults { model: String, count: usize },

    /// A relation key column was not fetched for the parent record
    #[error("Column '{column}' of '{model}' is required to load a relation but was not fetched")]
    MissingKeyColumn { model: String, column: String },

    /// The operation document cannot be executed
    #[error("Invalid query document: {message}")]
    InvalidDocument { message: String },
}

impl QueryError {
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::MultipleResults { .. } => "MULTIPLE_RESULTS",
            QueryError::MissingKeyColumn { .. } => "MISSING_KEY_COLUMN",
            QueryError::InvalidDocument { .. } => "INVALID_QUERY",
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse configuration: {message}")]
    Parse { message: String },

    #[error("Invalid relation '{relation}' on model '{model}': {message}")]
    InvalidRelation {
        model: String,
        relation: String,
        message: String,
    },
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors reported by a data source
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("Fetching '{model}' failed: {message}")]
    Backend { model: String, message: String },
}

impl StorageError {
    /// Wrap a data source failure
    pub fn backend(model: impl Into<String>, error: &anyhow::Error) -> Self {
        StorageError::Backend {
            model: model.into(),
            message: format!("{:#}", error),
        }
    }
}
