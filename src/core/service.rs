//! Data source trait consumed by the resolvers and batch loaders

use crate::core::error::{QueryError, Result, StorageError};
use crate::core::field::{RecordKey, Row};
use crate::core::model::RelationDescriptor;
use crate::core::schema::AggregateFunction;
use crate::select::ProjectionPlan;
use async_trait::async_trait;
use std::collections::HashMap;

/// Constraints of a base fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchQuery {
    /// Equality filters (column -> value), usually the field arguments
    pub filters: Row,

    /// Named scopes applied to the query
    pub scopes: Vec<String>,

    /// Relation aggregates added to every returned row
    pub annotations: Vec<Annotation>,
}

/// A value computed over a relation of each fetched record
///
/// Stored on the returned row under `attribute`, next to the projected
/// columns. Records without related rows get `0` for a count and null
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub attribute: String,
    pub relation: RelationDescriptor,
    pub function: AggregateFunction,
    /// Related column aggregated by every function except `Count`
    pub column: Option<String>,
}

impl FetchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(column.into(), value);
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// Storage access used by the loader
///
/// The loader is agnostic to the underlying storage: implementations receive
/// the projection to apply and return plain rows.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch every record of `model` matching `query`
    async fn fetch_many(
        &self,
        model: &str,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> anyhow::Result<Vec<Row>>;

    /// Fetch the related records of many parents at once
    ///
    /// Rows are grouped by the parent key they belong to. Keys without any
    /// related record may be absent from the result. `query` constrains and
    /// annotates the related records.
    async fn fetch_by_keys(
        &self,
        relation: &RelationDescriptor,
        keys: &[RecordKey],
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> anyhow::Result<HashMap<RecordKey, Vec<Row>>>;

    /// Fetch at most one record of `model`
    ///
    /// Fails with `MultipleResults` when the query matches several records.
    async fn fetch_one(
        &self,
        model: &str,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<Option<Row>> {
        let mut rows = self
            .fetch_many(model, plan, query)
            .await
            .map_err(|e| StorageError::backend(model, &e))?;

        if rows.len() > 1 {
            return Err(QueryError::MultipleResults {
                model: model.to_string(),
                count: rows.len(),
            }
            .into());
        }

        Ok(rows.pop())
    }
}
