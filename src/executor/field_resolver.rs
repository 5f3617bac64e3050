//! Object completion and relation registration
//!
//! Completing an object never suspends: plain fields are read from the
//! fetched row, relation fields register their parent key with the batch
//! for their path and leave a null placeholder. The pending registration
//! is handed to the pass, which reads it once every sibling registered.

use super::core::Pass;
use super::host::LoaderHost;
use super::selection::FieldNode;
use crate::batch::{BatchKey, BatchLoader, LoaderKind, RelationBatchLoader};
use crate::core::error::{LoaderError, Result, SchemaError};
use crate::core::field::Row;
use crate::core::model::RelationDescriptor;
use crate::core::path::ResponsePath;
use crate::core::schema::{Directive, FieldDefinition};
use crate::core::service::FetchQuery;
use crate::scheduler::DeferredValue;
use crate::select::ProjectionPlan;
use serde_json::{Value, json};
use std::sync::Arc;

/// Rows of a relation shaped for its field
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    One(Option<Row>),
    Many(Vec<Row>),
    Count(usize),
}

/// Where a loaded relation is completed
pub(crate) struct RelationTarget<'op> {
    pub path: ResponsePath,
    pub node: &'op FieldNode,
    /// Output type of the related records
    pub type_name: String,
    pub model: String,
}

/// A relation field waiting for its batch
pub(crate) struct PendingField<'op> {
    pub target: RelationTarget<'op>,
    pub value: DeferredValue<Resolved>,
}

enum FieldValue<'op> {
    Ready(Value),
    Deferred(PendingField<'op>),
}

/// Complete `row` as an object of `type_name` with the requested selection
pub(crate) fn complete_object<'op>(
    host: &LoaderHost,
    pass: &mut Pass<'op>,
    type_name: &str,
    model: &str,
    row: &Row,
    selection: &'op [FieldNode],
    path: &ResponsePath,
) -> Result<Value> {
    let (concrete, fields) = host
        .types
        .object_type(&host.types.reduce_wrapper(type_name))?;

    let mut object = serde_json::Map::new();

    for node in selection {
        let field_path = path.field(node.response_key());

        if node.name == "__typename" {
            object.insert(node.response_key().to_string(), json!(concrete));
            continue;
        }

        let Some(definition) = fields.iter().find(|f| f.name == node.name) else {
            object.insert(node.response_key().to_string(), Value::Null);
            continue;
        };

        let value = match resolve_field(host, pass, model, row, definition, node, &field_path) {
            Ok(FieldValue::Ready(value)) => value,
            Ok(FieldValue::Deferred(pending)) => {
                pass.enqueue(pending);
                Value::Null
            }
            Err(e) => {
                pass.error(&field_path, &e);
                Value::Null
            }
        };
        object.insert(node.response_key().to_string(), value);
    }

    Ok(Value::Object(object))
}

/// Complete every row as an item of a list
///
/// A failing item becomes null; its siblings are unaffected.
pub(crate) fn complete_list<'op>(
    host: &LoaderHost,
    pass: &mut Pass<'op>,
    type_name: &str,
    model: &str,
    rows: &[Row],
    selection: &'op [FieldNode],
    path: &ResponsePath,
) -> Value {
    let mut items = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let item_path = path.index(index);
        match complete_object(host, pass, type_name, model, row, selection, &item_path) {
            Ok(item) => items.push(item),
            Err(e) => {
                pass.error(&item_path, &e);
                items.push(Value::Null);
            }
        }
    }

    Value::Array(items)
}

/// Complete a relation once its batch has flushed
pub(crate) fn complete_resolved<'op>(
    host: &LoaderHost,
    pass: &mut Pass<'op>,
    target: &RelationTarget<'op>,
    resolved: Resolved,
) -> Result<Value> {
    match resolved {
        Resolved::Count(count) => Ok(json!(count)),
        Resolved::One(None) => Ok(Value::Null),
        Resolved::One(Some(row)) => complete_object(
            host,
            pass,
            &target.type_name,
            &target.model,
            &row,
            &target.node.selection,
            &target.path,
        ),
        Resolved::Many(rows) => Ok(complete_list(
            host,
            pass,
            &target.type_name,
            &target.model,
            &rows,
            &target.node.selection,
            &target.path,
        )),
    }
}

fn resolve_field<'op>(
    host: &LoaderHost,
    pass: &mut Pass<'op>,
    model: &str,
    row: &Row,
    definition: &FieldDefinition,
    node: &'op FieldNode,
    path: &ResponsePath,
) -> Result<FieldValue<'op>> {
    match definition.relation_directive() {
        Some(directive) if directive.loads_relation() => {
            register_relation(host, pass, model, row, definition, directive, node, path)
        }
        Some(directive) => Ok(FieldValue::Ready(annotation_value(definition, directive, row))),
        None => Ok(FieldValue::Ready(attribute_value(definition, row))),
    }
}

/// Value of a `withCount` or `aggregate` field, computed by the fetch
fn annotation_value(definition: &FieldDefinition, directive: &Directive, row: &Row) -> Value {
    directive
        .annotation_attribute(&definition.name)
        .and_then(|attribute| row.get(&attribute).cloned())
        .unwrap_or(Value::Null)
}

/// Value of a plain field, read from its source attribute
fn attribute_value(definition: &FieldDefinition, row: &Row) -> Value {
    let attribute = definition.renamed_attribute().unwrap_or(&definition.name);
    row.get(attribute)
        .or_else(|| row.get(&definition.name))
        .cloned()
        .unwrap_or(Value::Null)
}

#[allow(clippy::too_many_arguments)]
fn register_relation<'op>(
    host: &LoaderHost,
    pass: &mut Pass<'op>,
    model: &str,
    row: &Row,
    definition: &FieldDefinition,
    directive: &Directive,
    node: &'op FieldNode,
    path: &ResponsePath,
) -> Result<FieldValue<'op>> {
    let relation_name = directive
        .relation_name(&definition.name)
        .unwrap_or(&definition.name);
    let relation = host
        .models
        .relation_descriptor(model, relation_name)
        .ok_or_else(|| SchemaError::RelationNotFound {
            model: model.to_string(),
            relation: relation_name.to_string(),
        })?;
    let counting = matches!(directive, Directive::Count { .. });

    let Some(key) = relation.parent_key(row)? else {
        return Ok(FieldValue::Ready(empty_value(relation, counting)));
    };

    let (type_name, related_model) = match &relation.related {
        Some(related) => (definition.return_type.clone(), related.clone()),
        None => {
            let (concrete, _) = key.split_composite().ok_or_else(|| {
                LoaderError::Internal(format!("Polymorphic key '{}' has no type", key))
            })?;
            (concrete.to_string(), concrete.to_string())
        }
    };

    let kind = if counting {
        LoaderKind::Count
    } else {
        LoaderKind::Relation
    };
    // Records of several models can share a path (morph-to targets), so
    // each relation gets its own batch there
    let batch_key = BatchKey::new(kind, path).scoped(relation.qualified_name());
    let batch = pass.scheduler.batch_for(batch_key, || {
        let plan = related_plan(host, relation, definition, node, counting)?;
        let query = related_query(host, relation, definition, node, counting)?;
        tracing::debug!(
            relation = %relation.qualified_name(),
            plan = ?plan,
            annotations = query.annotations.len(),
            "planned related projection"
        );
        let loader: Arc<dyn BatchLoader> = Arc::new(
            RelationBatchLoader::new(host.source.clone(), relation.clone(), plan)
                .with_query(query),
        );
        Ok(loader)
    })?;

    let many = relation.kind.is_many();
    let value = pass
        .scheduler
        .defer(&batch, key, path.clone(), move |loaded| {
            tracing::trace!(path = %loaded.context, rows = loaded.rows.len(), "relation loaded");
            Ok(if counting {
                Resolved::Count(loaded.rows.len())
            } else if many {
                Resolved::Many(loaded.rows)
            } else {
                Resolved::One(loaded.rows.into_iter().next())
            })
        })?;

    Ok(FieldValue::Deferred(PendingField {
        target: RelationTarget {
            path: path.clone(),
            node,
            type_name,
            model: related_model,
        },
        value,
    }))
}

/// Value of a relation whose parent key is null
fn empty_value(relation: &RelationDescriptor, counting: bool) -> Value {
    if counting {
        json!(0)
    } else if relation.kind.is_many() {
        json!([])
    } else {
        Value::Null
    }
}

/// Projection of the related records
///
/// Planned from the relation field's own sub-selection, plus the column the
/// rows are grouped by, the related primary key and the keys of the next
/// level's relations.
fn related_plan(
    host: &LoaderHost,
    relation: &RelationDescriptor,
    definition: &FieldDefinition,
    node: &FieldNode,
    counting: bool,
) -> Result<ProjectionPlan> {
    let Some(related) = relation.related.as_deref() else {
        return Ok(ProjectionPlan::SelectAll);
    };
    if !host.settings.optimized_selects {
        return Ok(ProjectionPlan::SelectAll);
    }

    if counting {
        let plan = ProjectionPlan::columns([relation.related_column()]);
        return Ok(match host.models.primary_key(related) {
            Some(primary_key) => plan.with_column(primary_key),
            None => plan,
        });
    }

    Ok(host
        .plan_fetch(&definition.return_type, node, related)?
        .with_column(relation.related_column()))
}

/// Aggregates requested on the related records
///
/// Morph-to targets are of several models and are not annotated.
fn related_query(
    host: &LoaderHost,
    relation: &RelationDescriptor,
    definition: &FieldDefinition,
    node: &FieldNode,
    counting: bool,
) -> Result<FetchQuery> {
    let Some(related) = relation.related.as_deref() else {
        return Ok(FetchQuery::new());
    };
    if counting {
        return Ok(FetchQuery::new());
    }

    Ok(host
        .annotations(&definition.return_type, node, related)?
        .into_iter()
        .fold(FetchQuery::new(), FetchQuery::annotate))
}
