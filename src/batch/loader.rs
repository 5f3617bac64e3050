//! Bulk fetch strategies executed when a batch flushes

use crate::core::field::{RecordKey, Row};
use crate::core::model::RelationDescriptor;
use crate::core::service::{DataSource, FetchQuery};
use crate::select::ProjectionPlan;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Rows grouped by the key that requested them
pub type Grouped = HashMap<RecordKey, Vec<Row>>;

/// Performs the single bulk fetch behind a batch
#[async_trait]
pub trait BatchLoader: Send + Sync {
    /// Load the rows for every key in one fetch
    async fn load(&self, keys: &[RecordKey]) -> anyhow::Result<Grouped>;
}

/// Loads a model relation for many parents through the data source
pub struct RelationBatchLoader {
    source: Arc<dyn DataSource>,
    relation: RelationDescriptor,
    plan: ProjectionPlan,
    query: FetchQuery,
}

impl RelationBatchLoader {
    pub fn new(
        source: Arc<dyn DataSource>,
        relation: RelationDescriptor,
        plan: ProjectionPlan,
    ) -> Self {
        Self {
            source,
            relation,
            plan,
            query: FetchQuery::new(),
        }
    }

    /// Constrain or annotate the related records
    pub fn with_query(mut self, query: FetchQuery) -> Self {
        self.query = query;
        self
    }

    pub fn relation(&self) -> &RelationDescriptor {
        &self.relation
    }

    pub fn plan(&self) -> &ProjectionPlan {
        &self.plan
    }
}

#[async_trait]
impl BatchLoader for RelationBatchLoader {
    async fn load(&self, keys: &[RecordKey]) -> anyhow::Result<Grouped> {
        self.source
            .fetch_by_keys(&self.relation, keys, &self.plan, &self.query)
            .await
    }
}
