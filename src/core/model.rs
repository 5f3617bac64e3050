//! Model definitions and resolved relation metadata

use crate::core::error::{QueryError, Result};
use crate::core::field::{RecordKey, Row};
use serde::{Deserialize, Serialize};

/// How a relation constrains the projection of its parent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRequirement {
    /// The parent's local key must be fetched (has-one, has-many, ...)
    LocalKey,
    /// The parent's foreign key must be fetched (belongs-to)
    ForeignKey,
    /// The target type is only known after the fetch; project everything
    Opaque,
    /// Resolved by a separate query; no parent column required
    Ignore,
}

/// Kind of a model relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
    MorphOne,
    MorphMany,
    MorphTo,
    MorphToMany,
}

impl RelationKind {
    pub fn key_requirement(&self) -> KeyRequirement {
        match self {
            RelationKind::HasOne
            | RelationKind::HasMany
            | RelationKind::MorphOne
            | RelationKind::MorphMany => KeyRequirement::LocalKey,
            RelationKind::BelongsTo => KeyRequirement::ForeignKey,
            RelationKind::MorphTo | RelationKind::MorphToMany => KeyRequirement::Opaque,
            RelationKind::BelongsToMany => KeyRequirement::Ignore,
        }
    }

    /// Whether the relation yields a list of records
    pub fn is_many(&self) -> bool {
        matches!(
            self,
            RelationKind::HasMany
                | RelationKind::MorphMany
                | RelationKind::BelongsToMany
                | RelationKind::MorphToMany
        )
    }

    /// Whether the relation goes through a pivot table
    pub fn uses_pivot(&self) -> bool {
        matches!(self, RelationKind::BelongsToMany | RelationKind::MorphToMany)
    }
}

/// Intermediate table of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    /// Model (table) holding the pivot rows
    pub model: String,

    /// Pivot column referencing the parent record
    pub parent_key: String,

    /// Pivot column referencing the related record
    pub related_key: String,

    /// Pivot column holding the parent type of a polymorphic pivot
    #[serde(default)]
    pub morph_type: Option<String>,
}

/// A relation as declared on a model in configuration
///
/// Unset keys follow naming conventions and are filled in when the model
/// catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub name: String,

    pub kind: RelationKind,

    /// Related model, absent only for polymorphic-to-one relations
    #[serde(default)]
    pub related: Option<String>,

    #[serde(default)]
    pub local_key: Option<String>,

    #[serde(default)]
    pub foreign_key: Option<String>,

    /// Key column on the related record (belongs-to, morph-to, many-to-many)
    #[serde(default)]
    pub owner_key: Option<String>,

    /// Column holding the type name of a polymorphic relation
    #[serde(default)]
    pub morph_type: Option<String>,

    #[serde(default)]
    pub pivot: Option<PivotTable>,
}

/// A data model: its stored columns, derived attributes and relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,

    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Stored columns
    #[serde(default)]
    pub columns: Vec<String>,

    /// Attributes computed by an accessor after the fetch
    #[serde(default)]
    pub computed: Vec<String>,

    /// Instance methods that are not columns
    #[serde(default)]
    pub methods: Vec<String>,

    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl ModelDefinition {
    /// Whether `name` is derived rather than stored
    ///
    /// Relation names count as methods of the model.
    pub fn is_derived_attribute(&self, name: &str) -> bool {
        self.computed.iter().any(|c| c == name)
            || self.methods.iter().any(|m| m == name)
            || self.relations.iter().any(|r| r.name == name)
    }
}

/// A relation resolved against its concrete model
///
/// For has-* relations the parent column is `local_key` and the related
/// column `foreign_key`. For belongs-to and morph-to the parent column is
/// `foreign_key` and the related column `owner_key`. Many-to-many relations
/// join `local_key` to `owner_key` through the pivot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationDescriptor {
    pub name: String,
    pub parent: String,
    pub kind: RelationKind,
    pub related: Option<String>,
    pub local_key: String,
    pub foreign_key: String,
    pub owner_key: String,
    pub morph_type: Option<String>,
    pub pivot: Option<PivotTable>,
}

impl RelationDescriptor {
    pub fn key_requirement(&self) -> KeyRequirement {
        self.kind.key_requirement()
    }

    /// `Parent.relation`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.parent, self.name)
    }

    /// Column of the parent record whose value keys the load
    pub fn parent_column(&self) -> &str {
        match self.kind {
            RelationKind::BelongsTo | RelationKind::MorphTo => &self.foreign_key,
            _ => &self.local_key,
        }
    }

    /// Column of the related record matched against the parent key
    pub fn related_column(&self) -> &str {
        match self.kind {
            RelationKind::HasOne
            | RelationKind::HasMany
            | RelationKind::MorphOne
            | RelationKind::MorphMany => &self.foreign_key,
            RelationKind::BelongsTo
            | RelationKind::MorphTo
            | RelationKind::BelongsToMany
            | RelationKind::MorphToMany => &self.owner_key,
        }
    }

    /// Key a parent record loads this relation with
    ///
    /// `Ok(None)` when the key column is null: there is nothing to load.
    /// A column absent from the record means it was not fetched.
    pub fn parent_key(&self, row: &Row) -> Result<Option<RecordKey>> {
        let column = self.parent_column();
        let value = row.get(column).ok_or_else(|| QueryError::MissingKeyColumn {
            model: self.parent.clone(),
            column: column.to_string(),
        })?;
        let Some(key) = RecordKey::from_value(value) else {
            return Ok(None);
        };

        if self.kind != RelationKind::MorphTo {
            return Ok(Some(key));
        }

        let type_column = self.morph_type.as_deref().unwrap_or_default();
        let type_value = row
            .get(type_column)
            .ok_or_else(|| QueryError::MissingKeyColumn {
                model: self.parent.clone(),
                column: type_column.to_string(),
            })?;
        Ok(type_value
            .as_str()
            .map(|type_name| RecordKey::composite(type_name, &key)))
    }
}

/// Lookup of models and their relations
pub trait ModelRegistry: Send + Sync {
    /// Get a model definition by name
    fn model(&self, name: &str) -> Option<&ModelDefinition>;

    /// Resolve a relation of a model
    fn relation_descriptor(&self, model: &str, relation: &str) -> Option<&RelationDescriptor>;

    /// Whether `name` is a computed attribute or method of `model`
    fn is_derived_attribute(&self, model: &str, name: &str) -> bool {
        self.model(model)
            .is_some_and(|definition| definition.is_derived_attribute(name))
    }

    /// Primary key column of `model`
    fn primary_key(&self, model: &str) -> Option<&str> {
        self.model(model)
            .map(|definition| definition.primary_key.as_str())
    }
}
