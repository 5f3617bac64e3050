//! Response assembled by the executor

use crate::core::error::LoaderError;
use crate::core::path::{PathSegment, ResponsePath};
use serde::Serialize;
use serde_json::Value;

/// Result of executing an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub data: Value,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Value at a dotted path such as `posts.0.author.name`
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.data);
        }
        self.data.pointer(&format!("/{}", path.replace('.', "/")))
    }

    /// Errors reported at `path`
    pub fn errors_at(&self, path: &str) -> Vec<&FieldError> {
        self.errors
            .iter()
            .filter(|error| error.path.to_string() == path)
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// An error attached to the field that failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub code: String,
    pub path: ResponsePath,
}

impl FieldError {
    pub fn new(path: &ResponsePath, error: &LoaderError) -> Self {
        Self {
            message: error.to_string(),
            code: error.error_code().to_string(),
            path: path.clone(),
        }
    }
}

/// Write `value` at `path` inside `data`
///
/// Returns false when the path no longer exists, e.g. because an ancestor
/// was replaced by null after an error.
pub(crate) fn write_at(data: &mut Value, path: &ResponsePath, value: Value) -> bool {
    let Some((last, parents)) = path.segments().split_last() else {
        *data = value;
        return true;
    };

    let mut current = data;
    for segment in parents {
        let next = match segment {
            PathSegment::Field(name) => current.get_mut(name.as_str()),
            PathSegment::Index(index) => current.get_mut(*index),
        };
        match next {
            Some(next) => current = next,
            None => return false,
        }
    }

    match (last, current) {
        (PathSegment::Field(name), Value::Object(object)) => {
            object.insert(name.clone(), value);
            true
        }
        (PathSegment::Index(index), Value::Array(items)) if *index < items.len() => {
            items[*index] = value;
            true
        }
        _ => false,
    }
}
