//! Projection planner

use super::ProjectionPlan;
use crate::core::error::{Result, SchemaError};
use crate::core::model::{KeyRequirement, ModelRegistry};
use crate::core::schema::{Directive, FieldDefinition, TypeRegistry};
use indexmap::IndexSet;
use std::sync::Arc;

/// Computes the columns a node's fetch must project
///
/// For each requested field:
/// 1. fields unknown to the type are skipped (`__typename`, ...)
/// 2. relation directives decide first: local-key and foreign-key relations
///    contribute their key column, polymorphic relations abort the pass with
///    [`ProjectionPlan::SelectAll`], ignored relations contribute nothing
/// 3. otherwise `select` columns, a `rename` attribute or the field name
///
/// Computed attributes and methods of the model are dropped at the end.
#[derive(Clone)]
pub struct SelectionPlanner {
    types: Arc<dyn TypeRegistry>,
    models: Arc<dyn ModelRegistry>,
    strict_relations: bool,
}

impl SelectionPlanner {
    /// Create a lenient planner: unknown relations are logged and skipped
    pub fn new(types: Arc<dyn TypeRegistry>, models: Arc<dyn ModelRegistry>) -> Self {
        Self {
            types,
            models,
            strict_relations: false,
        }
    }

    /// Fail with `RelationNotFound` instead of skipping the relation
    pub fn strict_relations(mut self, strict: bool) -> Self {
        self.strict_relations = strict;
        self
    }

    /// Plan the projection for `selection` on `type_name`, fetched from `model`
    pub fn plan<S: AsRef<str>>(
        &self,
        type_name: &str,
        selection: &[S],
        model: &str,
    ) -> Result<ProjectionPlan> {
        let item_type = self.types.reduce_wrapper(type_name);
        let fields = self.types.fields_of(&item_type)?;

        if self.models.model(model).is_none() {
            return Err(SchemaError::UnknownModel {
                model: model.to_string(),
            }
            .into());
        }

        let mut columns = IndexSet::new();

        for requested in selection {
            let requested = requested.as_ref();
            let Some(field) = fields.iter().find(|f| f.name == requested) else {
                continue;
            };

            if let Some(directive) = field.relation_directive() {
                match directive.key_requirement() {
                    Some(KeyRequirement::Opaque) => {
                        tracing::debug!(
                            type_name = %item_type,
                            field = %requested,
                            "polymorphic relation selected, projecting every column"
                        );
                        return Ok(ProjectionPlan::SelectAll);
                    }
                    Some(requirement @ (KeyRequirement::LocalKey | KeyRequirement::ForeignKey)) => {
                        if let Some(column) =
                            self.relation_key(model, field, directive, requirement)?
                        {
                            columns.insert(column);
                        }
                    }
                    _ => {}
                }
                continue;
            }

            if let Some(selected) = field.select_columns() {
                columns.extend(selected.iter().cloned());
            } else if let Some(attribute) = field.renamed_attribute() {
                columns.insert(attribute.to_string());
            } else {
                columns.insert(requested.to_string());
            }
        }

        columns.retain(|column: &String| !self.models.is_derived_attribute(model, column));

        tracing::debug!(
            type_name = %item_type,
            model = %model,
            columns = ?columns,
            "planned projection"
        );

        Ok(ProjectionPlan::Columns(columns))
    }

    fn relation_key(
        &self,
        model: &str,
        field: &FieldDefinition,
        directive: &Directive,
        requirement: KeyRequirement,
    ) -> Result<Option<String>> {
        let relation_name = directive.relation_name(&field.name).unwrap_or(&field.name);

        let Some(relation) = self.models.relation_descriptor(model, relation_name) else {
            if self.strict_relations {
                return Err(SchemaError::RelationNotFound {
                    model: model.to_string(),
                    relation: relation_name.to_string(),
                }
                .into());
            }
            tracing::warn!(
                model = %model,
                relation = %relation_name,
                "relation not found on model, its key column is not projected"
            );
            return Ok(None);
        };

        let column = match requirement {
            KeyRequirement::ForeignKey => &relation.foreign_key,
            _ => &relation.local_key,
        };
        Ok(Some(column.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ModelDefinition;
    use crate::core::schema::TypeDefinition;
    use crate::registry::{ModelCatalog, SchemaRegistry};

    fn planner() -> SelectionPlanner {
        let types: Vec<TypeDefinition> = serde_yaml::from_str(
            r#"
- kind: object
  name: Post
  fields:
    - { name: id, type: ID }
    - { name: title, type: String }
    - { name: content, type: String, directives: [{ name: rename, attribute: body }] }
    - { name: summary, type: String, directives: [{ name: select, columns: [title, body] }] }
    - { name: excerpt, type: String }
    - { name: author, type: User, directives: [{ name: hasOne }] }
    - { name: writer, type: User, directives: [{ name: belongsTo, relation: owner }] }
    - { name: comments, type: Comment, list: true, directives: [{ name: hasMany }] }
    - { name: tags, type: Tag, list: true, directives: [{ name: belongsToMany }] }
    - { name: attachable, type: Attachable, directives: [{ name: morphTo }] }
    - { name: editor, type: User, directives: [{ name: hasOne }] }
- kind: object
  name: User
  fields:
    - { name: name, type: String }
"#,
        )
        .unwrap();

        let models: Vec<ModelDefinition> = serde_yaml::from_str(
            r#"
- name: User
- name: Comment
- name: Tag
- name: PostTag
- name: Post
  columns: [id, title, body, author_id, owner_id]
  computed: [excerpt]
  relations:
    - { name: author, kind: hasOne, related: User, local_key: author_id, foreign_key: id }
    - { name: owner, kind: belongsTo, related: User }
    - { name: comments, kind: hasMany, related: Comment }
    - name: tags
      kind: belongsToMany
      related: Tag
      pivot: { model: PostTag, parent_key: post_id, related_key: tag_id }
    - { name: attachable, kind: morphTo }
"#,
        )
        .unwrap();

        SelectionPlanner::new(
            Arc::new(SchemaRegistry::new(types)),
            Arc::new(ModelCatalog::new(models).unwrap()),
        )
    }

    #[test]
    fn test_plain_columns_are_deduplicated() {
        let plan = planner()
            .plan("Post", &["id", "title", "title"], "Post")
            .unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["id", "title"]));
    }

    #[test]
    fn test_local_key_relation_contributes_its_key() {
        let plan = planner().plan("Post", &["title", "author"], "Post").unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["title", "author_id"]));
    }

    #[test]
    fn test_foreign_key_relation_contributes_its_key() {
        let plan = planner().plan("Post", &["writer"], "Post").unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["owner_id"]));
    }

    #[test]
    fn test_has_many_contributes_parent_key() {
        let plan = planner().plan("Post", &["comments"], "Post").unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["id"]));
    }

    #[test]
    fn test_polymorphic_relation_selects_everything() {
        let plan = planner()
            .plan("Post", &["title", "attachable", "author"], "Post")
            .unwrap();
        assert_eq!(plan, ProjectionPlan::SelectAll);
    }

    #[test]
    fn test_ignored_relation_contributes_nothing() {
        let plan = planner().plan("Post", &["tags"], "Post").unwrap();
        assert_eq!(plan, ProjectionPlan::columns(Vec::<String>::new()));
        assert!(!plan.is_select_all());
    }

    #[test]
    fn test_rename_and_select_directives() {
        let plan = planner()
            .plan("Post", &["content", "summary"], "Post")
            .unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["body", "title"]));
    }

    #[test]
    fn test_computed_attributes_are_dropped() {
        let plan = planner().plan("Post", &["title", "excerpt"], "Post").unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["title"]));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let plan = planner()
            .plan("Post", &["__typename", "title"], "Post")
            .unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["title"]));
    }

    #[test]
    fn test_paginator_type_is_reduced() {
        let plan = planner()
            .plan("PostPaginator", &["title"], "Post")
            .unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["title"]));
    }

    #[test]
    fn test_unknown_type_is_schema_inconsistency() {
        let err = planner().plan("Ghost", &["title"], "Post").unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_INCONSISTENCY");
    }

    #[test]
    fn test_missing_relation_is_skipped_when_lenient() {
        let plan = planner().plan("Post", &["title", "editor"], "Post").unwrap();
        assert_eq!(plan, ProjectionPlan::columns(["title"]));
    }

    #[test]
    fn test_missing_relation_fails_when_strict() {
        let err = planner()
            .strict_relations(true)
            .plan("Post", &["title", "editor"], "Post")
            .unwrap_err();
        assert_eq!(err.error_code(), "RELATION_NOT_FOUND");
    }
}
