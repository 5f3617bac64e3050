//! Batch identity

use crate::core::path::ResponsePath;
use serde::Serialize;
use std::fmt;

/// What a batch loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderKind {
    /// Related records
    Relation,
    /// Number of related records
    Count,
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderKind::Relation => f.write_str("relation"),
            LoaderKind::Count => f.write_str("count"),
        }
    }
}

/// Identifies one coalescing group: loader kind plus the response path
/// with list indices removed
///
/// `posts.0.author` and `posts.7.author` share a key; `posts.0.author` and
/// `posts.0.comments.0.author` do not. A key may be scoped further, e.g. to
/// the relation it loads, when records of several models sit at one path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    kind: LoaderKind,
    path: Vec<String>,
    scope: Option<String>,
}

impl BatchKey {
    pub fn new(kind: LoaderKind, path: &ResponsePath) -> Self {
        Self {
            kind,
            path: path.without_indices(),
            scope: None,
        }
    }

    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn kind(&self) -> LoaderKind {
        self.kind
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.path.join("."))?;
        if let Some(scope) = &self.scope {
            write!(f, "[{}]", scope)?;
        }
        Ok(())
    }
}
