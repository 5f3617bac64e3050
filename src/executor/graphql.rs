//! GraphQL documents as executor operations

use super::core::Executor;
use super::response::Response;
use super::selection::{FieldNode, Operation, merge_field};
use crate::core::error::{QueryError, Result};
use graphql_parser::query::{
    Definition, FragmentDefinition, OperationDefinition, Selection, Value as GqlValue, parse_query,
};
use serde_json::{Value, json};
use std::collections::HashMap;

type Fragments<'d, 'a> = HashMap<&'d str, &'d FragmentDefinition<'a, String>>;

impl Executor {
    /// Parse and execute a GraphQL query
    pub async fn execute_query(
        &self,
        query: &str,
        variables: Option<HashMap<String, Value>>,
    ) -> Result<Response> {
        let operation = parse_operation(query, &variables.unwrap_or_default())?;
        Ok(self.execute(&operation).await)
    }
}

/// Convert the first operation of a GraphQL document
///
/// Fragments are inlined and variables substituted. Mutations and
/// subscriptions are rejected.
pub fn parse_operation(query: &str, variables: &HashMap<String, Value>) -> Result<Operation> {
    let doc = parse_query::<String>(query).map_err(|e| invalid(e.to_string()))?;

    let fragments: Fragments = doc
        .definitions
        .iter()
        .filter_map(|def| match def {
            Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
            Definition::Operation(_) => None,
        })
        .collect();

    let operation = doc
        .definitions
        .iter()
        .find_map(|def| match def {
            Definition::Operation(op) => Some(op),
            Definition::Fragment(_) => None,
        })
        .ok_or_else(|| invalid("No operation found in query"))?;

    let mut variables = variables.clone();
    let selection_set = match operation {
        OperationDefinition::Query(query) => {
            for definition in &query.variable_definitions {
                if let Some(default) = &definition.default_value
                    && !variables.contains_key(&definition.name)
                {
                    let value = gql_value_to_json(default, &variables);
                    variables.insert(definition.name.clone(), value);
                }
            }
            &query.selection_set
        }
        OperationDefinition::SelectionSet(selection_set) => selection_set,
        OperationDefinition::Mutation(_) | OperationDefinition::Subscription(_) => {
            return Err(invalid("Only query operations are supported"));
        }
    };

    let mut visiting = Vec::new();
    let selection = convert_selection(
        &selection_set.items,
        &fragments,
        &variables,
        &mut visiting,
    )?;

    Ok(Operation { selection })
}

fn convert_selection<'d, 'a>(
    items: &'d [Selection<'a, String>],
    fragments: &Fragments<'d, 'a>,
    variables: &HashMap<String, Value>,
    visiting: &mut Vec<&'d str>,
) -> Result<Vec<FieldNode>> {
    let mut nodes = Vec::new();

    for item in items {
        match item {
            Selection::Field(field) => merge_field(
                &mut nodes,
                FieldNode {
                    name: field.name.clone(),
                    alias: field.alias.clone(),
                    arguments: field
                        .arguments
                        .iter()
                        .map(|(name, value)| (name.clone(), gql_value_to_json(value, variables)))
                        .collect(),
                    selection: convert_selection(
                        &field.selection_set.items,
                        fragments,
                        variables,
                        visiting,
                    )?,
                },
            ),
            Selection::FragmentSpread(spread) => {
                let name = spread.fragment_name.as_str();
                let fragment = fragments
                    .get(name)
                    .ok_or_else(|| invalid(format!("Unknown fragment '{}'", name)))?;
                if visiting.contains(&name) {
                    return Err(invalid(format!("Fragment '{}' spreads itself", name)));
                }

                visiting.push(name);
                for node in convert_selection(
                    &fragment.selection_set.items,
                    fragments,
                    variables,
                    visiting,
                )? {
                    merge_field(&mut nodes, node);
                }
                visiting.pop();
            }
            // Type conditions are not checked: on a union every member
            // receives the fragment's fields
            Selection::InlineFragment(inline) => {
                for node in convert_selection(
                    &inline.selection_set.items,
                    fragments,
                    variables,
                    visiting,
                )? {
                    merge_field(&mut nodes, node);
                }
            }
        }
    }

    Ok(nodes)
}

/// Convert GraphQL value to JSON
pub fn gql_value_to_json(value: &GqlValue<String>, variables: &HashMap<String, Value>) -> Value {
    match value {
        GqlValue::Null => Value::Null,
        GqlValue::Int(i) => json!(i.as_i64().unwrap_or(0)),
        GqlValue::Float(f) => json!(f),
        GqlValue::String(s) => json!(s),
        GqlValue::Boolean(b) => json!(b),
        GqlValue::Enum(e) => json!(e),
        GqlValue::List(list) => Value::Array(
            list.iter()
                .map(|item| gql_value_to_json(item, variables))
                .collect(),
        ),
        GqlValue::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), gql_value_to_json(v, variables)))
                .collect(),
        ),
        GqlValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
    }
}

fn invalid(message: impl Into<String>) -> crate::core::error::LoaderError {
    QueryError::InvalidDocument {
        message: message.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_selection_with_alias() {
        let operation = parse_operation(
            "{ latest: posts { title author { name } } }",
            &HashMap::new(),
        )
        .unwrap();

        let posts = &operation.selection[0];
        assert_eq!(posts.name, "posts");
        assert_eq!(posts.response_key(), "latest");
        assert_eq!(posts.child_names(), vec!["title", "author"]);
        assert_eq!(posts.selection[1].child_names(), vec!["name"]);
    }

    #[test]
    fn test_arguments_and_variables() {
        let mut variables = HashMap::new();
        variables.insert("id".to_string(), json!(7));

        let operation = parse_operation(
            "query Post($id: ID!, $status: String = \"draft\") { post(id: $id, status: $status) { title } }",
            &variables,
        )
        .unwrap();

        let post = &operation.selection[0];
        assert_eq!(post.arguments["id"], json!(7));
        assert_eq!(post.arguments["status"], json!("draft"));
    }

    #[test]
    fn test_fragments_are_inlined() {
        let operation = parse_operation(
            "query { posts { ...PostFields ... on Post { id } } } fragment PostFields on Post { title }",
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(operation.selection[0].child_names(), vec!["title", "id"]);
    }

    #[test]
    fn test_overlapping_fragments_merge() {
        let operation = parse_operation(
            "{ posts { id author { name } ...Authored } } fragment Authored on Post { author { email } }",
            &HashMap::new(),
        )
        .unwrap();

        let posts = &operation.selection[0];
        assert_eq!(posts.child_names(), vec!["id", "author"]);
        assert_eq!(posts.selection[1].child_names(), vec!["name", "email"]);
    }

    #[test]
    fn test_rejects_mutations_and_bad_documents() {
        let mutation = parse_operation("mutation { createPost { id } }", &HashMap::new());
        assert_eq!(mutation.unwrap_err().error_code(), "INVALID_QUERY");

        let broken = parse_operation("not valid graphql {{{{", &HashMap::new());
        assert!(broken.is_err());

        let fragment_only = parse_operation("fragment F on Post { id }", &HashMap::new());
        assert!(fragment_only.is_err());
    }
}
