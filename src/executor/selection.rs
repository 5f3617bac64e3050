//! Selection tree of an operation

use crate::core::field::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One requested field and its sub-selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldNode {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Field arguments; root resolvers turn them into equality filters
    #[serde(default, skip_serializing_if = "Row::is_empty")]
    pub arguments: Row,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<FieldNode>,
}

impl FieldNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    /// Add a child field, merged with a sibling of the same response key
    pub fn select(mut self, child: FieldNode) -> Self {
        merge_field(&mut self.selection, child);
        self
    }

    /// Add several leaf children
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            merge_field(&mut self.selection, FieldNode::new(name));
        }
        self
    }

    /// Key of this field in the response object
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Requested field names of the sub-selection, duplicates removed
    pub fn child_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.selection.len());
        for child in &self.selection {
            if !names.contains(&child.name.as_str()) {
                names.push(&child.name);
            }
        }
        names
    }
}

/// A read operation: the root selection on the `Query` type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub selection: Vec<FieldNode>,
}

impl Operation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, field: FieldNode) -> Self {
        merge_field(&mut self.selection, field);
        self
    }

    /// The operation with repeated fields merged at every level
    pub fn merged(&self) -> Operation {
        Operation {
            selection: merge_selection(self.selection.clone()),
        }
    }
}

/// Add `field` to `selection`
///
/// Fields sharing a response key are one field: the later copy's
/// sub-selection is merged into the earlier one and its arguments are
/// dropped.
pub fn merge_field(selection: &mut Vec<FieldNode>, field: FieldNode) {
    match selection
        .iter()
        .position(|existing| existing.response_key() == field.response_key())
    {
        Some(index) => {
            let existing = &mut selection[index];
            for child in field.selection {
                merge_field(&mut existing.selection, child);
            }
        }
        None => selection.push(field),
    }
}

/// Merge repeated fields of a selection, recursively
pub fn merge_selection(selection: Vec<FieldNode>) -> Vec<FieldNode> {
    let mut merged = Vec::with_capacity(selection.len());
    for mut field in selection {
        field.selection = merge_selection(std::mem::take(&mut field.selection));
        merge_field(&mut merged, field);
    }
    merged
}
