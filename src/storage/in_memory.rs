//! In-memory implementation of DataSource for testing and development

use crate::core::field::{RecordKey, Row};
use crate::core::model::{RelationDescriptor, RelationKind};
use crate::core::schema::AggregateFunction;
use crate::core::service::{Annotation, DataSource, FetchQuery};
use crate::select::ProjectionPlan;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

type Scope = Arc<dyn Fn(&Row) -> bool + Send + Sync>;
type Accessor = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// A fetch performed against the data source
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRecord {
    /// A base fetch of one model
    Many { model: String, plan: ProjectionPlan },
    /// A bulk relation fetch (`relation` is `Parent.relation`)
    ByKeys {
        relation: String,
        keys: Vec<RecordKey>,
        plan: ProjectionPlan,
    },
}

/// In-memory data source
///
/// Tables are keyed by model name. Rows are projected with the requested
/// plan, then computed attributes are filled in by registered accessors
/// from the projected columns. Every fetch is recorded in a log so callers
/// can check how many queries a resolution pass issued.
#[derive(Clone, Default)]
pub struct InMemoryDataSource {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    scopes: Arc<RwLock<HashMap<String, Scope>>>,
    /// model -> (attribute, accessor)
    accessors: Arc<RwLock<HashMap<String, Vec<(String, Accessor)>>>>,
    unavailable: Arc<RwLock<HashSet<String>>>,
    log: Arc<RwLock<Vec<FetchRecord>>>,
}

impl InMemoryDataSource {
    /// Create an empty data source
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row (a JSON object) into the table of `model`
    pub fn insert(&self, model: &str, row: Value) -> Result<()> {
        let Value::Object(row) = row else {
            bail!("Rows of '{}' must be JSON objects", model);
        };
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        tables.entry(model.to_string()).or_default().push(row);
        Ok(())
    }

    /// Insert several rows into the table of `model`
    pub fn insert_many(&self, model: &str, rows: impl IntoIterator<Item = Value>) -> Result<()> {
        for row in rows {
            self.insert(model, row)?;
        }
        Ok(())
    }

    /// Register a named scope
    pub fn add_scope<F>(&self, name: &str, predicate: F) -> Result<()>
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        let mut scopes = self
            .scopes
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        scopes.insert(name.to_string(), Arc::new(predicate));
        Ok(())
    }

    /// Register an accessor computing `attribute` of `model` after the fetch
    pub fn add_accessor<F>(&self, model: &str, attribute: &str, accessor: F) -> Result<()>
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        let mut accessors = self
            .accessors
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        accessors
            .entry(model.to_string())
            .or_default()
            .push((attribute.to_string(), Arc::new(accessor)));
        Ok(())
    }

    /// Make every fetch touching `model` fail
    pub fn set_unavailable(&self, model: &str) -> Result<()> {
        let mut unavailable = self
            .unavailable
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        unavailable.insert(model.to_string());
        Ok(())
    }

    /// Every fetch performed so far, in order
    pub fn fetch_log(&self) -> Vec<FetchRecord> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    /// Bulk relation fetches performed for `relation` (`Parent.relation`)
    pub fn bulk_fetches(&self, relation: &str) -> Vec<Vec<RecordKey>> {
        self.fetch_log()
            .into_iter()
            .filter_map(|record| match record {
                FetchRecord::ByKeys {
                    relation: name,
                    keys,
                    ..
                } if name == relation => Some(keys),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&self) -> Result<()> {
        self.log
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .clear();
        Ok(())
    }

    fn record(&self, record: FetchRecord) -> Result<()> {
        self.log
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .push(record);
        Ok(())
    }

    fn ensure_available(&self, model: &str) -> Result<()> {
        let unavailable = self
            .unavailable
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        if unavailable.contains(model) {
            bail!("Table '{}' is unavailable", model);
        }
        Ok(())
    }

    /// Project a stored row and compute the model's accessors
    fn finish(&self, model: &str, plan: &ProjectionPlan, row: &Row) -> Result<Row> {
        let accessors = self
            .accessors
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut projected = plan.apply(row);
        for (attribute, accessor) in accessors.get(model).into_iter().flatten() {
            let value = accessor(&projected);
            projected.insert(attribute.clone(), value);
        }
        Ok(projected)
    }

    fn rows_of(&self, model: &str) -> Result<Vec<Row>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(tables.get(model).cloned().unwrap_or_default())
    }

    fn matches_query(&self, row: &Row, query: &FetchQuery) -> Result<bool> {
        let filters_match = query.filters.iter().all(|(column, expected)| {
            row.get(column).is_some_and(|actual| {
                actual == expected
                    || RecordKey::from_value(expected).is_some_and(|key| key.matches(actual))
            })
        });
        if !filters_match {
            return Ok(false);
        }

        let scopes = self
            .scopes
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        for name in &query.scopes {
            let scope = scopes
                .get(name)
                .ok_or_else(|| anyhow!("Unknown scope '{}'", name))?;
            if !scope(row) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Keep a stored row matching `query`: project it, then compute its
    /// accessors and annotations
    fn accept(
        &self,
        model: &str,
        plan: &ProjectionPlan,
        query: &FetchQuery,
        row: &Row,
    ) -> Result<Option<Row>> {
        if !self.matches_query(row, query)? {
            return Ok(None);
        }

        let mut projected = self.finish(model, plan, row)?;
        for annotation in &query.annotations {
            let value = self.aggregate(annotation, row)?;
            projected.insert(annotation.attribute.clone(), value);
        }
        Ok(Some(projected))
    }

    /// Compute an annotation over the related records of a stored row
    fn aggregate(&self, annotation: &Annotation, row: &Row) -> Result<Value> {
        let related = match annotation.relation.parent_key(row)? {
            Some(key) => {
                let keys = HashSet::from([key.clone()]);
                self.load_related(
                    &annotation.relation,
                    &keys,
                    &ProjectionPlan::SelectAll,
                    &FetchQuery::new(),
                )?
                .remove(&key)
                .unwrap_or_default()
            }
            None => Vec::new(),
        };
        Ok(aggregate_rows(annotation, &related))
    }

    fn load_related(
        &self,
        relation: &RelationDescriptor,
        keys: &HashSet<RecordKey>,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<HashMap<RecordKey, Vec<Row>>> {
        if let Some(related) = &relation.related {
            self.ensure_available(related)?;
        }

        match relation.kind {
            RelationKind::HasOne
            | RelationKind::HasMany
            | RelationKind::MorphOne
            | RelationKind::MorphMany => self.load_children(relation, keys, plan, query),
            RelationKind::BelongsTo => self.load_owners(relation, keys, plan, query),
            RelationKind::MorphTo => self.load_polymorphic_owners(relation, keys, plan, query),
            RelationKind::BelongsToMany | RelationKind::MorphToMany => {
                self.load_through_pivot(relation, keys, plan, query)
            }
        }
    }

    /// Has-one/has-many (optionally polymorphic): related rows point at the parent
    fn load_children(
        &self,
        relation: &RelationDescriptor,
        keys: &HashSet<RecordKey>,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<HashMap<RecordKey, Vec<Row>>> {
        let related = related_model(relation)?;
        let mut grouped: HashMap<RecordKey, Vec<Row>> = HashMap::new();

        for row in self.rows_of(related)? {
            let Some(key) = row.get(&relation.foreign_key).and_then(RecordKey::from_value) else {
                continue;
            };
            if !keys.contains(&key) {
                continue;
            }
            if let Some(type_column) = &relation.morph_type
                && row.get(type_column).and_then(Value::as_str) != Some(relation.parent.as_str())
            {
                continue;
            }
            if let Some(row) = self.accept(related, plan, query, &row)? {
                grouped.entry(key).or_default().push(row);
            }
        }

        Ok(grouped)
    }

    /// Belongs-to: the parent holds the related record's key
    fn load_owners(
        &self,
        relation: &RelationDescriptor,
        keys: &HashSet<RecordKey>,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<HashMap<RecordKey, Vec<Row>>> {
        let related = related_model(relation)?;
        let mut grouped: HashMap<RecordKey, Vec<Row>> = HashMap::new();

        for row in self.rows_of(related)? {
            let Some(key) = row.get(&relation.owner_key).and_then(RecordKey::from_value) else {
                continue;
            };
            if keys.contains(&key)
                && let Some(row) = self.accept(related, plan, query, &row)?
            {
                grouped.entry(key).or_default().push(row);
            }
        }

        Ok(grouped)
    }

    /// Morph-to: keys are `type:id`, each type read from its own table
    fn load_polymorphic_owners(
        &self,
        relation: &RelationDescriptor,
        keys: &HashSet<RecordKey>,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<HashMap<RecordKey, Vec<Row>>> {
        let mut grouped: HashMap<RecordKey, Vec<Row>> = HashMap::new();

        for key in keys {
            let (type_name, id) = key
                .split_composite()
                .ok_or_else(|| anyhow!("Polymorphic key '{}' has no type", key))?;
            self.ensure_available(type_name)?;

            for row in self.rows_of(type_name)? {
                if row.get(&relation.owner_key).is_some_and(|value| id.matches(value))
                    && let Some(row) = self.accept(type_name, plan, query, &row)?
                {
                    grouped.entry(key.clone()).or_default().push(row);
                }
            }
        }

        Ok(grouped)
    }

    /// Many-to-many through the pivot table
    fn load_through_pivot(
        &self,
        relation: &RelationDescriptor,
        keys: &HashSet<RecordKey>,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<HashMap<RecordKey, Vec<Row>>> {
        let related = related_model(relation)?;
        let pivot = relation
            .pivot
            .as_ref()
            .ok_or_else(|| anyhow!("Relation '{}' has no pivot table", relation.name))?;
        self.ensure_available(&pivot.model)?;

        let related_rows = self.rows_of(related)?;
        let mut grouped: HashMap<RecordKey, Vec<Row>> = HashMap::new();

        for pivot_row in self.rows_of(&pivot.model)? {
            let Some(key) = pivot_row
                .get(&pivot.parent_key)
                .and_then(RecordKey::from_value)
            else {
                continue;
            };
            if !keys.contains(&key) {
                continue;
            }
            if let Some(type_column) = &pivot.morph_type
                && pivot_row.get(type_column).and_then(Value::as_str)
                    != Some(relation.parent.as_str())
            {
                continue;
            }
            let Some(related_id) = pivot_row
                .get(&pivot.related_key)
                .and_then(RecordKey::from_value)
            else {
                continue;
            };

            for row in &related_rows {
                if row
                    .get(&relation.owner_key)
                    .is_some_and(|value| related_id.matches(value))
                    && let Some(row) = self.accept(related, plan, query, row)?
                {
                    grouped.entry(key.clone()).or_default().push(row);
                }
            }
        }

        Ok(grouped)
    }
}

fn aggregate_rows(annotation: &Annotation, rows: &[Row]) -> Value {
    if annotation.function == AggregateFunction::Count {
        return json!(rows.len());
    }

    let values: Vec<&Value> = match annotation.column.as_deref() {
        Some(column) => rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|value| value.is_number())
            .collect(),
        None => Vec::new(),
    };
    if values.is_empty() {
        return Value::Null;
    }

    let integers: Option<Vec<i64>> = values.iter().map(|value| value.as_i64()).collect();
    let floats: Vec<f64> = values.iter().filter_map(|value| value.as_f64()).collect();

    match (annotation.function, integers) {
        (AggregateFunction::Sum, Some(integers)) => json!(integers.iter().sum::<i64>()),
        (AggregateFunction::Min, Some(integers)) => json!(integers.iter().min()),
        (AggregateFunction::Max, Some(integers)) => json!(integers.iter().max()),
        (AggregateFunction::Sum, None) => json!(floats.iter().sum::<f64>()),
        (AggregateFunction::Min, None) => json!(floats.iter().copied().fold(f64::INFINITY, f64::min)),
        (AggregateFunction::Max, None) => {
            json!(floats.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        (AggregateFunction::Avg, _) => json!(floats.iter().sum::<f64>() / floats.len() as f64),
        (AggregateFunction::Count, _) => json!(rows.len()),
    }
}

fn related_model(relation: &RelationDescriptor) -> Result<&str> {
    relation
        .related
        .as_deref()
        .ok_or_else(|| anyhow!("Relation '{}' has no related model", relation.name))
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn fetch_many(
        &self,
        model: &str,
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<Vec<Row>> {
        self.record(FetchRecord::Many {
            model: model.to_string(),
            plan: plan.clone(),
        })?;
        self.ensure_available(model)?;

        let mut rows = Vec::new();
        for row in self.rows_of(model)? {
            if let Some(row) = self.accept(model, plan, query, &row)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    async fn fetch_by_keys(
        &self,
        relation: &RelationDescriptor,
        keys: &[RecordKey],
        plan: &ProjectionPlan,
        query: &FetchQuery,
    ) -> Result<HashMap<RecordKey, Vec<Row>>> {
        self.record(FetchRecord::ByKeys {
            relation: relation.qualified_name(),
            keys: keys.to_vec(),
            plan: plan.clone(),
        })?;

        let keys: HashSet<RecordKey> = keys.iter().cloned().collect();
        self.load_related(relation, &keys, plan, query)
    }
}
