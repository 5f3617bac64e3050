//! Loader host shared by every request
//!
//! The host bundles the registries, the planner and the data source. It is
//! immutable and request-agnostic: per-request state (batches, deferred
//! values, collected errors) lives in the executor pass.

use super::selection::FieldNode;
use crate::config::{LoaderConfig, PlannerConfig};
use crate::core::error::{Result, SchemaError};
use crate::core::model::ModelRegistry;
use crate::core::schema::{AggregateFunction, Directive, FieldDefinition, TypeRegistry};
use crate::core::service::{Annotation, DataSource};
use crate::select::{ProjectionPlan, SelectionPlanner};
use std::sync::Arc;

/// Host context containing the loader state
///
/// # Example
///
/// ```rust,ignore
/// let config = LoaderConfig::from_yaml_file("fixtures/blog.yaml")?;
/// let host = LoaderHost::from_config(&config, Arc::new(InMemoryDataSource::new()))?;
///
/// let plan = host.plan_projection("Post", &["title", "author"], "Post")?;
/// ```
pub struct LoaderHost {
    /// Schema types
    pub types: Arc<dyn TypeRegistry>,

    /// Models and their relations
    pub models: Arc<dyn ModelRegistry>,

    /// Projection planner over the registries above
    pub planner: SelectionPlanner,

    /// Storage behind every fetch
    pub source: Arc<dyn DataSource>,

    pub settings: PlannerConfig,
}

impl LoaderHost {
    pub fn new(
        types: Arc<dyn TypeRegistry>,
        models: Arc<dyn ModelRegistry>,
        source: Arc<dyn DataSource>,
        settings: PlannerConfig,
    ) -> Self {
        let planner = SelectionPlanner::new(types.clone(), models.clone())
            .strict_relations(settings.strict_relations);

        Self {
            types,
            models,
            planner,
            source,
            settings,
        }
    }

    /// Build the host from a configuration
    ///
    /// Fails when a model relation cannot be resolved.
    pub fn from_config(config: &LoaderConfig, source: Arc<dyn DataSource>) -> Result<Self> {
        let types = Arc::new(config.schema_registry());
        let models = Arc::new(config.model_catalog()?);

        tracing::debug!(
            types = config.types.len(),
            models = config.models.len(),
            optimized_selects = config.planner.optimized_selects,
            "loader host created"
        );

        Ok(Self::new(types, models, source, config.planner.clone()))
    }

    /// Plan the projection of a fetch
    ///
    /// Returns [`ProjectionPlan::SelectAll`] when optimized selects are
    /// disabled.
    pub fn plan_projection<S: AsRef<str>>(
        &self,
        type_name: &str,
        fields: &[S],
        model: &str,
    ) -> Result<ProjectionPlan> {
        if !self.settings.optimized_selects {
            return Ok(ProjectionPlan::SelectAll);
        }
        self.planner.plan(type_name, fields, model)
    }

    /// Plan the fetch of `model` rows completing `node`'s selection
    ///
    /// On top of the planned projection the rows keep their primary key and
    /// the parent column of every relation loaded from them, whatever class
    /// the relation's directive belongs to.
    pub fn plan_fetch(
        &self,
        type_name: &str,
        node: &FieldNode,
        model: &str,
    ) -> Result<ProjectionPlan> {
        let mut plan = self.plan_projection(type_name, &node.child_names(), model)?;
        if plan.is_select_all() {
            return Ok(plan);
        }

        if let Some(primary_key) = self.models.primary_key(model) {
            plan = plan.with_column(primary_key);
        }
        for (field, directive) in self.selected_relations(type_name, node)? {
            if !directive.loads_relation() {
                continue;
            }
            let relation_name = directive.relation_name(&field.name).unwrap_or(&field.name);
            if let Some(relation) = self.models.relation_descriptor(model, relation_name) {
                plan = plan.with_column(relation.parent_column());
            }
        }
        Ok(plan)
    }

    /// Relation aggregates requested by `withCount` and `aggregate` fields
    /// of `node`'s selection
    pub fn annotations(
        &self,
        type_name: &str,
        node: &FieldNode,
        model: &str,
    ) -> Result<Vec<Annotation>> {
        let mut annotations: Vec<Annotation> = Vec::new();

        for (field, directive) in self.selected_relations(type_name, node)? {
            let Some(attribute) = directive.annotation_attribute(&field.name) else {
                continue;
            };
            if annotations.iter().any(|a| a.attribute == attribute) {
                continue;
            }

            let relation_name = directive.relation_name(&field.name).unwrap_or(&field.name);
            let Some(relation) = self.models.relation_descriptor(model, relation_name) else {
                if self.settings.strict_relations {
                    return Err(SchemaError::RelationNotFound {
                        model: model.to_string(),
                        relation: relation_name.to_string(),
                    }
                    .into());
                }
                tracing::warn!(
                    model = %model,
                    relation = %relation_name,
                    "relation not found on model, its aggregate is not computed"
                );
                continue;
            };

            let (function, column) = match directive {
                Directive::Aggregate {
                    function, column, ..
                } => (*function, column.clone()),
                _ => (AggregateFunction::Count, None),
            };
            annotations.push(Annotation {
                attribute,
                relation: relation.clone(),
                function,
                column,
            });
        }

        Ok(annotations)
    }

    /// Selected fields of `type_name` carrying a relation directive
    fn selected_relations(
        &self,
        type_name: &str,
        node: &FieldNode,
    ) -> Result<Vec<(&FieldDefinition, &Directive)>> {
        let fields = self.types.fields_of(&self.types.reduce_wrapper(type_name))?;
        Ok(node
            .child_names()
            .into_iter()
            .filter_map(|name| fields.iter().find(|f| f.name == name))
            .filter_map(|field| field.relation_directive().map(|d| (field, d)))
            .collect())
    }
}
