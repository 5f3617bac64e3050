//! Selection-to-projection planning
//!
//! Given the fields a query selects on one node, [`SelectionPlanner`]
//! computes the columns the fetch for that node must project. Relation
//! fields contribute the key columns their loaders will need instead of
//! their own name.

pub mod planner;

pub use planner::SelectionPlanner;

use crate::core::field::Row;
use indexmap::IndexSet;

/// Columns to fetch for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionPlan {
    /// Exactly these columns. An empty set selects the source's defaults.
    Columns(IndexSet<String>),
    /// Every column; the shape could not be reduced statically
    SelectAll,
}

impl ProjectionPlan {
    /// Plan selecting the given columns
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProjectionPlan::Columns(columns.into_iter().map(Into::into).collect())
    }

    pub fn is_select_all(&self) -> bool {
        matches!(self, ProjectionPlan::SelectAll)
    }

    /// Whether the plan fetches `column`
    pub fn includes(&self, column: &str) -> bool {
        match self {
            ProjectionPlan::Columns(columns) => columns.is_empty() || columns.contains(column),
            ProjectionPlan::SelectAll => true,
        }
    }

    /// Add a column to an explicit column set
    ///
    /// `SelectAll` and the empty default selection already cover it.
    pub fn with_column(mut self, column: &str) -> Self {
        if let ProjectionPlan::Columns(columns) = &mut self
            && !columns.is_empty()
        {
            columns.insert(column.to_string());
        }
        self
    }

    /// Restrict a stored row to the planned columns
    pub fn apply(&self, row: &Row) -> Row {
        match self {
            ProjectionPlan::Columns(columns) if !columns.is_empty() => row
                .iter()
                .filter(|(column, _)| columns.contains(column.as_str()))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect(),
            _ => row.clone(),
        }
    }
}
