//! Schema types: type definitions, field definitions and their directives

use crate::core::error::{Result, SchemaError};
use crate::core::model::KeyRequirement;
use serde::{Deserialize, Serialize};

/// Configuration attached to a schema field
///
/// Relation directives take an optional `relation` argument naming the model
/// relation; it defaults to the field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum Directive {
    HasOne {
        #[serde(default)]
        relation: Option<String>,
    },
    HasMany {
        #[serde(default)]
        relation: Option<String>,
    },
    Count {
        #[serde(default)]
        relation: Option<String>,
    },
    MorphOne {
        #[serde(default)]
        relation: Option<String>,
    },
    MorphMany {
        #[serde(default)]
        relation: Option<String>,
    },
    BelongsTo {
        #[serde(default)]
        relation: Option<String>,
    },
    MorphTo {
        #[serde(default)]
        relation: Option<String>,
    },
    MorphToMany {
        #[serde(default)]
        relation: Option<String>,
    },
    /// Aggregate of a related column, computed by the parent query
    Aggregate {
        #[serde(default)]
        relation: Option<String>,
        #[serde(default)]
        function: AggregateFunction,
        #[serde(default)]
        column: Option<String>,
    },
    WithCount {
        #[serde(default)]
        relation: Option<String>,
    },
    BelongsToMany {
        #[serde(default)]
        relation: Option<String>,
    },
    /// Explicit source columns backing the field
    Select { columns: Vec<String> },
    /// The field reads a differently named source attribute
    Rename { attribute: String },
    /// Root resolver: a single record of `model`
    Find {
        model: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
    /// Root resolver: every record of `model`
    All {
        model: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
}

impl Directive {
    /// Projection class of a relation directive, `None` for other directives
    pub fn key_requirement(&self) -> Option<KeyRequirement> {
        match self {
            Directive::HasOne { .. }
            | Directive::HasMany { .. }
            | Directive::Count { .. }
            | Directive::MorphOne { .. }
            | Directive::MorphMany { .. } => Some(KeyRequirement::LocalKey),
            Directive::BelongsTo { .. } => Some(KeyRequirement::ForeignKey),
            Directive::MorphTo { .. } | Directive::MorphToMany { .. } => {
                Some(KeyRequirement::Opaque)
            }
            Directive::Aggregate { .. }
            | Directive::WithCount { .. }
            | Directive::BelongsToMany { .. } => Some(KeyRequirement::Ignore),
            Directive::Select { .. }
            | Directive::Rename { .. }
            | Directive::Find { .. }
            | Directive::All { .. } => None,
        }
    }

    /// Relation name for a relation directive placed on `field`
    pub fn relation_name<'a>(&'a self, field: &'a str) -> Option<&'a str> {
        let relation = match self {
            Directive::HasOne { relation }
            | Directive::HasMany { relation }
            | Directive::Count { relation }
            | Directive::MorphOne { relation }
            | Directive::MorphMany { relation }
            | Directive::BelongsTo { relation }
            | Directive::MorphTo { relation }
            | Directive::MorphToMany { relation }
            | Directive::Aggregate { relation, .. }
            | Directive::WithCount { relation }
            | Directive::BelongsToMany { relation } => relation,
            _ => return None,
        };
        Some(relation.as_deref().unwrap_or(field))
    }

    /// Whether the field value comes from a separately loaded relation
    ///
    /// Aggregates and count annotations are computed by the parent query.
    pub fn loads_relation(&self) -> bool {
        self.key_requirement().is_some()
            && !matches!(self, Directive::Aggregate { .. } | Directive::WithCount { .. })
    }

    /// Attribute holding the value of a `withCount` or `aggregate` field
    ///
    /// Follows the `{relation}_count` and `{relation}_{function}_{column}`
    /// naming of the annotated parent query.
    pub fn annotation_attribute(&self, field: &str) -> Option<String> {
        let relation = self.relation_name(field)?;
        match self {
            Directive::WithCount { .. }
            | Directive::Aggregate {
                function: AggregateFunction::Count,
                ..
            } => Some(format!("{}_count", relation)),
            Directive::Aggregate {
                function,
                column: Some(column),
                ..
            } => Some(format!("{}_{}_{}", relation, function, column)),
            Directive::Aggregate { function, .. } => Some(format!("{}_{}", relation, function)),
            _ => None,
        }
    }
}

/// Function of an `aggregate` directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        })
    }
}

/// Schema-level descriptor of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,

    /// Declared return type name, without list or non-null wrappers
    #[serde(rename = "type")]
    pub return_type: String,

    #[serde(default)]
    pub list: bool,

    #[serde(default)]
    pub directives: Vec<Directive>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            list: false,
            directives: Vec::new(),
        }
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// The relation directive governing this field
    ///
    /// Classes are checked in precedence order (local key, foreign key,
    /// opaque, ignore); the first matching directive wins.
    pub fn relation_directive(&self) -> Option<&Directive> {
        [
            KeyRequirement::LocalKey,
            KeyRequirement::ForeignKey,
            KeyRequirement::Opaque,
            KeyRequirement::Ignore,
        ]
        .into_iter()
        .find_map(|class| {
            self.directives
                .iter()
                .find(|d| d.key_requirement() == Some(class))
        })
    }

    /// Columns listed by a `select` directive
    pub fn select_columns(&self) -> Option<&[String]> {
        self.directives.iter().find_map(|d| match d {
            Directive::Select { columns } => Some(columns.as_slice()),
            _ => None,
        })
    }

    /// Source attribute named by a `rename` directive
    pub fn renamed_attribute(&self) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            Directive::Rename { attribute } => Some(attribute.as_str()),
            _ => None,
        })
    }

    /// The `find` or `all` directive of a root field
    pub fn root_resolver(&self) -> Option<&Directive> {
        self.directives
            .iter()
            .find(|d| matches!(d, Directive::Find { .. } | Directive::All { .. }))
    }
}

/// A named output type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeDefinition {
    Object {
        name: String,
        #[serde(default)]
        fields: Vec<FieldDefinition>,
    },
    Union {
        name: String,
        members: Vec<String>,
    },
}

impl TypeDefinition {
    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Object { name, .. } | TypeDefinition::Union { name, .. } => name,
        }
    }
}

/// Lookup of type definitions by name
pub trait TypeRegistry: Send + Sync {
    /// Get a type definition by name
    fn type_definition(&self, name: &str) -> Option<&TypeDefinition>;

    /// Reduce a wrapper type name (e.g. `PostPaginator`) to its item type (`Post`)
    fn reduce_wrapper(&self, name: &str) -> String;

    /// Resolve `name` to the object type whose fields are selected
    ///
    /// A union resolves to its first member. Selections on a union whose
    /// returned object is of another member type are approximated by the
    /// first member's fields.
    fn object_type(&self, name: &str) -> Result<(&str, &[FieldDefinition])> {
        let definition = self
            .type_definition(name)
            .ok_or_else(|| SchemaError::UnknownType {
                type_name: name.to_string(),
            })?;

        match definition {
            TypeDefinition::Object { name, fields } => Ok((name.as_str(), fields.as_slice())),
            TypeDefinition::Union { name, members } => {
                let first = members.first().ok_or_else(|| SchemaError::EmptyUnion {
                    type_name: name.clone(),
                })?;
                match self.type_definition(first) {
                    Some(TypeDefinition::Object { name, fields }) => {
                        Ok((name.as_str(), fields.as_slice()))
                    }
                    _ => Err(SchemaError::UnknownType {
                        type_name: first.clone(),
                    }
                    .into()),
                }
            }
        }
    }

    /// Field definitions of an object type (or a union's first member)
    fn fields_of(&self, name: &str) -> Result<&[FieldDefinition]> {
        self.object_type(name).map(|(_, fields)| fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_name_defaults_to_field() {
        let directive = Directive::HasMany { relation: None };
        assert_eq!(directive.relation_name("comments"), Some("comments"));

        let directive = Directive::BelongsTo {
            relation: Some("user".to_string()),
        };
        assert_eq!(directive.relation_name("author"), Some("user"));

        let directive = Directive::Rename {
            attribute: "body".to_string(),
        };
        assert_eq!(directive.relation_name("content"), None);
    }

    #[test]
    fn test_relation_directive_precedence() {
        let field = FieldDefinition::new("author", "User")
            .with_directive(Directive::MorphTo { relation: None })
            .with_directive(Directive::HasOne { relation: None });

        assert_eq!(
            field.relation_directive(),
            Some(&Directive::HasOne { relation: None })
        );
    }

    #[test]
    fn test_aggregates_do_not_load_relations() {
        assert!(Directive::HasMany { relation: None }.loads_relation());
        assert!(Directive::BelongsToMany { relation: None }.loads_relation());
        assert!(!Directive::WithCount { relation: None }.loads_relation());
        assert!(
            !Directive::Aggregate {
                relation: None,
                function: AggregateFunction::Sum,
                column: Some("votes".to_string()),
            }
            .loads_relation()
        );
        assert!(
            !Directive::Select {
                columns: vec!["a".to_string()]
            }
            .loads_relation()
        );
    }

    #[test]
    fn test_annotation_attributes() {
        let with_count = Directive::WithCount {
            relation: Some("comments".to_string()),
        };
        assert_eq!(
            with_count.annotation_attribute("numComments").as_deref(),
            Some("comments_count")
        );

        let sum = Directive::Aggregate {
            relation: None,
            function: AggregateFunction::Sum,
            column: Some("votes".to_string()),
        };
        assert_eq!(
            sum.annotation_attribute("comments").as_deref(),
            Some("comments_sum_votes")
        );

        let count: Directive =
            serde_yaml::from_str("{ name: aggregate, relation: tags }").unwrap();
        assert_eq!(count.annotation_attribute("x").as_deref(), Some("tags_count"));

        assert_eq!(Directive::HasMany { relation: None }.annotation_attribute("posts"), None);
    }

    #[test]
    fn test_directive_yaml_shape() {
        let yaml = r#"
name: author
type: User
directives:
  - name: belongsTo
    relation: user
  - name: select
    columns: [user_id]
"#;
        let field: FieldDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            field.directives,
            vec![
                Directive::BelongsTo {
                    relation: Some("user".to_string())
                },
                Directive::Select {
                    columns: vec!["user_id".to_string()]
                },
            ]
        );
        assert!(!field.list);
    }
}
