//! Model catalog: models and their resolved relations

use crate::core::error::{ConfigError, Result};
use crate::core::model::{
    ModelDefinition, ModelRegistry, RelationDefinition, RelationDescriptor, RelationKind,
};
use std::collections::HashMap;

/// Registry of models, resolving every declared relation up front
///
/// Keys left unset in configuration follow naming conventions:
/// - `local_key` defaults to the parent's primary key
/// - `owner_key` defaults to the related model's primary key (`id` for morph-to)
/// - `foreign_key` defaults to `{parent}_id` for has-* relations and to
///   `{relation}_id` for belongs-to and morph-to
/// - `morph_type` defaults to `{relation}_type` for morph-to
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: HashMap<String, ModelDefinition>,
    /// Maps (model, relation) -> descriptor
    relations: HashMap<(String, String), RelationDescriptor>,
}

impl ModelCatalog {
    /// Build the catalog, validating every relation
    pub fn new(models: impl IntoIterator<Item = ModelDefinition>) -> Result<Self> {
        let models: HashMap<String, ModelDefinition> = models
            .into_iter()
            .map(|model| (model.name.clone(), model))
            .collect();

        let mut relations = HashMap::new();
        for model in models.values() {
            for definition in &model.relations {
                let descriptor = resolve_relation(model, definition, &models)?;
                relations.insert((model.name.clone(), definition.name.clone()), descriptor);
            }
        }

        Ok(Self { models, relations })
    }

    /// All registered model names
    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    /// All resolved relations of a model
    pub fn relations_of(&self, model: &str) -> Vec<&RelationDescriptor> {
        self.relations
            .iter()
            .filter(|((owner, _), _)| owner == model)
            .map(|(_, descriptor)| descriptor)
            .collect()
    }
}

impl ModelRegistry for ModelCatalog {
    fn model(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    fn relation_descriptor(&self, model: &str, relation: &str) -> Option<&RelationDescriptor> {
        self.relations
            .get(&(model.to_string(), relation.to_string()))
    }
}

fn resolve_relation(
    parent: &ModelDefinition,
    definition: &RelationDefinition,
    models: &HashMap<String, ModelDefinition>,
) -> Result<RelationDescriptor> {
    let invalid = |message: &str| ConfigError::InvalidRelation {
        model: parent.name.clone(),
        relation: definition.name.clone(),
        message: message.to_string(),
    };

    let related = match (&definition.related, definition.kind) {
        (None, RelationKind::MorphTo) => None,
        (None, _) => return Err(invalid("a related model is required").into()),
        (Some(name), _) => Some(
            models
                .get(name)
                .ok_or_else(|| invalid(&format!("related model '{}' is not registered", name)))?,
        ),
    };

    let pivot = match (&definition.pivot, definition.kind.uses_pivot()) {
        (Some(pivot), true) => Some(pivot.clone()),
        (None, true) => return Err(invalid("a pivot table is required").into()),
        (_, false) => None,
    };

    let foreign_key = match (&definition.foreign_key, definition.kind) {
        (Some(key), _) => key.clone(),
        (None, RelationKind::HasOne | RelationKind::HasMany) => {
            format!("{}_id", to_snake_case(&parent.name))
        }
        (None, RelationKind::BelongsTo | RelationKind::MorphTo) => {
            format!("{}_id", to_snake_case(&definition.name))
        }
        (None, RelationKind::BelongsToMany | RelationKind::MorphToMany) => pivot
            .as_ref()
            .map(|p| p.parent_key.clone())
            .unwrap_or_default(),
        (None, RelationKind::MorphOne | RelationKind::MorphMany) => {
            return Err(invalid("a foreign key is required for morph relations").into());
        }
    };

    let morph_type = match (&definition.morph_type, definition.kind) {
        (Some(column), _) => Some(column.clone()),
        (None, RelationKind::MorphTo) => Some(format!("{}_type", to_snake_case(&definition.name))),
        (None, RelationKind::MorphOne | RelationKind::MorphMany) => {
            return Err(invalid("a morph type column is required").into());
        }
        (None, _) => None,
    };

    let owner_key = definition.owner_key.clone().unwrap_or_else(|| {
        related
            .map(|model| model.primary_key.clone())
            .unwrap_or_else(|| "id".to_string())
    });

    Ok(RelationDescriptor {
        name: definition.name.clone(),
        parent: parent.name.clone(),
        kind: definition.kind,
        related: related.map(|model| model.name.clone()),
        local_key: definition
            .local_key
            .clone()
            .unwrap_or_else(|| parent.primary_key.clone()),
        foreign_key,
        owner_key,
        morph_type,
        pivot,
    })
}

/// Convert PascalCase or camelCase to snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(yaml: &str) -> Vec<ModelDefinition> {
        serde_yaml::from_str(yaml).unwrap()
    }

    const BLOG: &str = r#"
- name: User
  columns: [id, name]
  relations:
    - name: posts
      kind: hasMany
      related: Post
      foreign_key: author_id
- name: BlogPost
  columns: [id]
  relations:
    - name: comments
      kind: hasMany
      related: Comment
- name: Post
  columns: [id, title, author_id]
  relations:
    - name: author
      kind: belongsTo
      related: User
    - name: tags
      kind: belongsToMany
      related: Tag
      pivot: { model: PostTag, parent_key: post_id, related_key: tag_id }
- name: Comment
  columns: [id, blog_post_id]
- name: Tag
  primary_key: tag_id
  columns: [tag_id, label]
- name: Image
  columns: [id, imageable_id, imageable_type]
  relations:
    - name: imageable
      kind: morphTo
"#;

    #[test]
    fn test_conventional_keys() {
        let catalog = ModelCatalog::new(models(BLOG)).unwrap();

        let author = catalog.relation_descriptor("Post", "author").unwrap();
        assert_eq!(author.foreign_key, "author_id");
        assert_eq!(author.owner_key, "id");
        assert_eq!(author.related.as_deref(), Some("User"));

        let comments = catalog.relation_descriptor("BlogPost", "comments").unwrap();
        assert_eq!(comments.local_key, "id");
        assert_eq!(comments.foreign_key, "blog_post_id");

        let tags = catalog.relation_descriptor("Post", "tags").unwrap();
        assert_eq!(tags.owner_key, "tag_id");
        assert_eq!(tags.foreign_key, "post_id");

        let imageable = catalog.relation_descriptor("Image", "imageable").unwrap();
        assert_eq!(imageable.related, None);
        assert_eq!(imageable.foreign_key, "imageable_id");
        assert_eq!(imageable.morph_type.as_deref(), Some("imageable_type"));
    }

    #[test]
    fn test_unknown_relation_is_absent() {
        let catalog = ModelCatalog::new(models(BLOG)).unwrap();
        assert!(catalog.relation_descriptor("Post", "editor").is_none());
        assert!(catalog.relation_descriptor("Ghost", "author").is_none());
        assert_eq!(catalog.relations_of("Post").len(), 2);
    }

    #[test]
    fn test_missing_related_model_is_rejected() {
        let err = ModelCatalog::new(models(
            r#"
- name: Post
  relations:
    - name: author
      kind: belongsTo
      related: Person
"#,
        ))
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("Person"));
    }

    #[test]
    fn test_many_to_many_requires_pivot() {
        let result = ModelCatalog::new(models(
            r#"
- name: Tag
- name: Post
  relations:
    - name: tags
      kind: belongsToMany
      related: Tag
"#,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
        assert_eq!(to_snake_case("author"), "author");
        assert_eq!(to_snake_case("coverImage"), "cover_image");
    }
}
