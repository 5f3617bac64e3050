//! Response-tree paths

use serde::Serialize;
use std::fmt;

/// One step of a response path: an object key or a list index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Location of a value in the response tree (e.g. `posts.3.author`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResponsePath(Vec<PathSegment>);

impl ResponsePath {
    /// The empty path (response root)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of an object key below this path
    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.into()));
        Self(segments)
    }

    /// Path of a list item below this path
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names only, list indices dropped
    ///
    /// Sibling items of a list share this form, which is what batches are
    /// keyed by.
    pub fn without_indices(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|segment| match segment {
                PathSegment::Field(name) => Some(name.clone()),
                PathSegment::Index(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Field(name) => f.write_str(name)?,
                PathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}
