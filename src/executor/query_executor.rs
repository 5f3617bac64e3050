//! Root field resolution on the `Query` type

use super::core::Pass;
use super::field_resolver;
use super::host::LoaderHost;
use super::selection::FieldNode;
use crate::core::error::{Result, SchemaError, StorageError};
use crate::core::path::ResponsePath;
use crate::core::schema::Directive;
use crate::core::service::FetchQuery;
use serde_json::{Value, json};

/// Name of the root type
pub const ROOT_TYPE: &str = "Query";

/// Resolve a root field through its `find` or `all` directive
///
/// Arguments become equality filters on the columns of the same name.
pub(crate) async fn resolve_root_field<'op>(
    host: &LoaderHost,
    pass: &mut Pass<'op>,
    node: &'op FieldNode,
    path: &ResponsePath,
) -> Result<Value> {
    if node.name == "__typename" {
        return Ok(json!(ROOT_TYPE));
    }

    let definition = host
        .types
        .fields_of(ROOT_TYPE)?
        .iter()
        .find(|f| f.name == node.name)
        .ok_or_else(|| SchemaError::UnknownField {
            type_name: ROOT_TYPE.to_string(),
            field: node.name.clone(),
        })?;

    let (model, scopes, single) = match definition.root_resolver() {
        Some(Directive::Find { model, scopes }) => (model.as_str(), scopes, true),
        Some(Directive::All { model, scopes }) => (model.as_str(), scopes, false),
        _ => {
            return Err(SchemaError::MissingResolver {
                field: node.name.clone(),
            }
            .into());
        }
    };

    let type_name = host.types.reduce_wrapper(&definition.return_type);
    let plan = host.plan_fetch(&type_name, node, model)?;
    let query = host
        .annotations(&type_name, node, model)?
        .into_iter()
        .fold(root_query(node, scopes), FetchQuery::annotate);

    tracing::debug!(
        field = %node.name,
        model = %model,
        plan = ?plan,
        filters = query.filters.len(),
        "fetching root field"
    );

    if single {
        let row = host.source.fetch_one(model, &plan, &query).await?;
        match row {
            Some(row) => field_resolver::complete_object(
                host,
                pass,
                &type_name,
                model,
                &row,
                &node.selection,
                path,
            ),
            None => Ok(Value::Null),
        }
    } else {
        let rows = host
            .source
            .fetch_many(model, &plan, &query)
            .await
            .map_err(|e| StorageError::backend(model, &e))?;

        tracing::debug!(field = %node.name, rows = rows.len(), "root rows fetched");

        Ok(field_resolver::complete_list(
            host,
            pass,
            &type_name,
            model,
            &rows,
            &node.selection,
            path,
        ))
    }
}

fn root_query(node: &FieldNode, scopes: &[String]) -> FetchQuery {
    let query = node
        .arguments
        .iter()
        .fold(FetchQuery::new(), |query, (column, value)| {
            query.filter(column.clone(), value.clone())
        });
    scopes
        .iter()
        .fold(query, |query, scope| query.scope(scope.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_query_from_arguments_and_scopes() {
        let node = FieldNode::new("post")
            .argument("id", json!(3))
            .argument("slug", json!("hello"));
        let query = root_query(&node, &["published".to_string()]);

        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters["id"], json!(3));
        assert_eq!(query.scopes, vec!["published"]);
    }
}
