//! Filter criteria held by the navigator.
//!
//! [`StructuralFilters`] narrow the read-model query itself; [`FilterCriteria`]
//! only narrow the in-memory forest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Manager constraint on the read-model query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ManagerFilter {
    #[default]
    Any,
    Manager(String),
    /// Only projects with no manager assigned.
    Unassigned,
}

/// Filters applied by the row source query. `None` means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralFilters {
    pub manager: ManagerFilter,
    pub project_id: Option<String>,
    pub stage_id: Option<String>,
    pub object_id: Option<String>,
    pub department_id: Option<String>,
    pub team_id: Option<String>,
    pub employee_id: Option<String>,
}

impl StructuralFilters {
    /// True when any department/team/employee constraint is set.
    pub fn has_organization_filter(&self) -> bool {
        self.department_id.is_some() || self.team_id.is_some() || self.employee_id.is_some()
    }

    /// Whether the manager constraint still admits projects managed by `viewer_id`.
    pub fn admits_manager(&self, viewer_id: &str) -> bool {
        match &self.manager {
            ManagerFilter::Any => true,
            ManagerFilter::Manager(id) => id == viewer_id,
            ManagerFilter::Unassigned => false,
        }
    }
}

/// In-memory filter values applied by the filter pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterCriteria {
    pub status_ids: BTreeSet<String>,
    pub only_sections: bool,
    pub only_favorites: bool,
    pub search_query: String,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.status_ids.is_empty()
            && !self.only_sections
            && !self.only_favorites
            && self.search_query.trim().is_empty()
    }
}
