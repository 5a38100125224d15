//! Navigator state container.
//!
//! Owns the cached rows, the built and sorted forest, the visible (filtered)
//! forest, the filter criteria and the view state. All mutators are
//! synchronous and run to completion; async work (fetches, writes) lives in
//! the service and hands results back through [`LoadTicket`]s.

use serde::Serialize;
use tracing::{debug, info};

use crate::criteria::{FilterCriteria, StructuralFilters};
use crate::filters::apply_filters;
use crate::schema::{find_node, walk_mut, GroupingMode, Node, Row, SectionNode};
use crate::sorter::sort_forest;
use crate::tree_builder::build_forest;
use crate::view_state::{FocusRequest, ViewState};
use crate::view_store::PersistedView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Issued when a load starts; its result is applied only if the structural
/// filters it was issued for are still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub filters: StructuralFilters,
}

/// Display fields of a section status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct StatusDisplay {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// What the UI renders.
#[derive(Debug, Clone, Serialize)]
pub struct TreeSnapshot {
    pub nodes: Vec<Node>,
    pub grouping: GroupingMode,
    pub criteria: FilterCriteria,
    pub filters: StructuralFilters,
    pub view: ViewState,
    pub focus: Option<FocusRequest>,
    pub status_management_open: bool,
    pub status: LoadStatus,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    rows: Vec<Row>,
    forest: Vec<Node>,
    visible: Vec<Node>,
    criteria: FilterCriteria,
    filters: StructuralFilters,
    view: ViewState,
    status: LoadStatus,
    generation: u64,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::from_persisted(PersistedView::default())
    }
}

impl Navigator {
    /// Start from a restored view; the forest stays empty until the first load.
    pub fn from_persisted(persisted: PersistedView) -> Self {
        Self {
            rows: Vec::new(),
            forest: Vec::new(),
            visible: Vec::new(),
            criteria: FilterCriteria {
                only_sections: persisted.only_sections,
                ..Default::default()
            },
            filters: StructuralFilters::default(),
            view: persisted.view,
            status: LoadStatus::Idle,
            generation: 0,
        }
    }

    pub fn persisted(&self) -> PersistedView {
        PersistedView {
            view: self.view.clone(),
            only_sections: self.criteria.only_sections,
        }
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            nodes: self.visible.clone(),
            grouping: self.view.grouping_mode(),
            criteria: self.criteria.clone(),
            filters: self.filters.clone(),
            view: self.view.clone(),
            focus: self.view.focus.clone(),
            status_management_open: self.view.status_management_open,
            status: self.status.clone(),
        }
    }

    /// Sorted, unfiltered forest.
    #[cfg(test)]
    pub fn forest(&self) -> &[Node] {
        &self.forest
    }

    /// Forest after the filter pipeline.
    #[cfg(test)]
    pub fn visible(&self) -> &[Node] {
        &self.visible
    }

    #[cfg(test)]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    #[cfg(test)]
    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    #[cfg(test)]
    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Replace the structural filters and start a load for them.
    pub fn set_structural_filters(&mut self, filters: StructuralFilters) -> LoadTicket {
        self.filters = filters;
        self.begin_load()
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.status = LoadStatus::Loading;
        LoadTicket {
            generation: self.generation,
            filters: self.filters.clone(),
        }
    }

    /// Apply a finished load. Returns false when the result was discarded
    /// because the filters changed while it was in flight.
    pub fn finish_load(&mut self, ticket: &LoadTicket, result: Result<Vec<Row>, String>) -> bool {
        if ticket.filters != self.filters {
            debug!(
                "Discarding stale load #{} (current generation #{})",
                ticket.generation, self.generation
            );
            return false;
        }

        match result {
            Ok(rows) => {
                self.rows = rows;
                self.status = LoadStatus::Ready;
                self.rebuild();
                info!(
                    "Applied load #{}: {} rows, {} roots",
                    ticket.generation,
                    self.rows.len(),
                    self.forest.len()
                );
            }
            Err(message) => {
                self.rows.clear();
                self.forest.clear();
                self.visible.clear();
                self.status = LoadStatus::Failed(message);
            }
        }
        true
    }

    /// Build and sort from the cached rows, then refilter.
    fn rebuild(&mut self) {
        let mut forest = build_forest(&self.rows, self.view.grouping_mode());
        sort_forest(&mut forest);
        self.forest = forest;
        self.refilter();
    }

    fn refilter(&mut self) {
        self.visible = apply_filters(&self.forest, &self.criteria);
    }

    // ========================================================================
    // Criteria and grouping
    // ========================================================================

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.refilter();
    }

    pub fn toggle_only_favorites(&mut self) {
        self.criteria.only_favorites = !self.criteria.only_favorites;
        self.refilter();
    }

    pub fn reset_only_favorites(&mut self) {
        if self.criteria.only_favorites {
            self.criteria.only_favorites = false;
            self.refilter();
        }
    }

    pub fn toggle_grouping_by_client(&mut self) {
        self.view = std::mem::take(&mut self.view).toggle_grouping_by_client();
        self.rebuild();
    }

    pub fn toggle_show_managers(&mut self) {
        self.view = std::mem::take(&mut self.view).toggle_show_managers();
        self.rebuild();
    }

    /// Canonical top-level view: manager grouping, no sections-only, nothing expanded.
    pub fn collapse_all(&mut self) {
        self.criteria.only_sections = false;
        self.view = std::mem::take(&mut self.view).collapse_all();
        self.rebuild();
    }

    pub fn open_status_management(&mut self) {
        self.view = std::mem::take(&mut self.view).open_status_management();
    }

    pub fn select_tab(&mut self, tab: &str) {
        self.view = std::mem::take(&mut self.view).select_tab(tab);
    }

    // ========================================================================
    // Expansion and focus
    // ========================================================================

    pub fn toggle_expanded(&mut self, id: &str) {
        self.view = std::mem::take(&mut self.view).toggle_expanded(id);
    }

    /// Expand every ancestor of `id` in the visible forest and request a
    /// scroll to it. Returns the focus sequence, or `None` when the node is
    /// not visible.
    pub fn focus(&mut self, id: &str) -> Option<u64> {
        self.focus_path(id, false)
    }

    /// Focus after a structural creation; also expands the new node itself.
    pub fn focus_created(&mut self, id: &str) -> Option<u64> {
        self.focus_path(id, true)
    }

    fn focus_path(&mut self, id: &str, include_target: bool) -> Option<u64> {
        let Some(path) = find_path(&self.visible, id) else {
            debug!("Focus target {} not in current tree", id);
            return None;
        };

        let ancestors = path.len().saturating_sub(1);
        let mut to_expand: Vec<String> = path[..ancestors].to_vec();
        if include_target && find_node(&self.visible, id).is_some_and(Node::has_children) {
            to_expand.push(id.to_string());
        }

        let view = std::mem::take(&mut self.view).expand(to_expand).request_focus(id);
        let seq = view.focus.as_ref().map(|f| f.seq);
        self.view = view;
        seq
    }

    /// Clear focus request `seq` if it has not been superseded.
    pub fn clear_focus(&mut self, seq: u64) {
        self.view = std::mem::take(&mut self.view).clear_focus(seq);
    }

    /// Expand `id` and every descendant that has children. Returns false if
    /// `id` is not visible.
    pub fn expand_all_from(&mut self, id: &str) -> bool {
        let Some(node) = find_node(&self.visible, id) else {
            return false;
        };
        let mut ids = Vec::new();
        collect_expandable(node, &mut ids);
        self.view = std::mem::take(&mut self.view).expand(ids);
        true
    }

    // ========================================================================
    // In-place patches
    // ========================================================================

    /// Assign (or clear) the status of one section. Returns the number of
    /// section nodes changed.
    pub fn patch_section_status(&mut self, section_id: &str, status: Option<&StatusDisplay>) -> usize {
        let changed = self.patch_sections(
            |s| s.id == section_id,
            |s| {
                s.status_id = status.map(|st| st.id.clone());
                s.status_name = status.map(|st| st.name.clone());
                s.status_color = status.map(|st| st.color.clone());
            },
        );
        for row in self.rows.iter_mut().filter(|r| r.section_id.as_deref() == Some(section_id)) {
            row.status_id = status.map(|st| st.id.clone());
            row.status_name = status.map(|st| st.name.clone());
            row.status_color = status.map(|st| st.color.clone());
        }
        self.refilter();
        changed
    }

    /// Rename or recolor a status everywhere it is shown.
    pub fn rename_status(&mut self, status_id: &str, name: &str, color: &str) -> usize {
        let changed = self.patch_sections(
            |s| s.status_id.as_deref() == Some(status_id),
            |s| {
                s.status_name = Some(name.to_string());
                s.status_color = Some(color.to_string());
            },
        );
        for row in self.rows.iter_mut().filter(|r| r.status_id.as_deref() == Some(status_id)) {
            row.status_name = Some(name.to_string());
            row.status_color = Some(color.to_string());
        }
        self.refilter();
        changed
    }

    /// Clear a deleted status from every section showing it.
    pub fn delete_status(&mut self, status_id: &str) -> usize {
        let changed = self.patch_sections(
            |s| s.status_id.as_deref() == Some(status_id),
            |s| {
                s.status_id = None;
                s.status_name = None;
                s.status_color = None;
            },
        );
        for row in self.rows.iter_mut().filter(|r| r.status_id.as_deref() == Some(status_id)) {
            row.status_id = None;
            row.status_name = None;
            row.status_color = None;
        }
        self.refilter();
        changed
    }

    pub fn patch_project_status(&mut self, project_id: &str, project_status: &str) -> usize {
        let mut changed = 0;
        walk_mut(&mut self.forest, &mut |node| {
            if let Node::Project(project) = node {
                if project.id == project_id {
                    project.project_status = Some(project_status.to_string());
                    changed += 1;
                }
            }
        });
        for row in self.rows.iter_mut().filter(|r| r.project_id.as_deref() == Some(project_id)) {
            row.project_status = Some(project_status.to_string());
        }
        self.refilter();
        changed
    }

    /// Current favorite flag of a project in the forest.
    pub fn is_favorite(&self, project_id: &str) -> Option<bool> {
        match find_node(&self.forest, project_id) {
            Some(Node::Project(project)) => Some(project.is_favorite),
            _ => None,
        }
    }

    /// Set a project's favorite flag and re-sort. Returns false when the
    /// project is not in the forest.
    pub fn set_favorite(&mut self, project_id: &str, favorite: bool) -> bool {
        let mut found = false;
        walk_mut(&mut self.forest, &mut |node| {
            if let Node::Project(project) = node {
                if project.id == project_id {
                    project.is_favorite = favorite;
                    found = true;
                }
            }
        });
        if !found {
            return false;
        }
        for row in self.rows.iter_mut().filter(|r| r.project_id.as_deref() == Some(project_id)) {
            row.is_favorite = favorite;
        }
        sort_forest(&mut self.forest);
        self.refilter();
        true
    }

    fn patch_sections(
        &mut self,
        select: impl Fn(&SectionNode) -> bool,
        apply: impl Fn(&mut SectionNode),
    ) -> usize {
        let mut changed = 0;
        walk_mut(&mut self.forest, &mut |node| {
            if let Node::Section(section) = node {
                if select(&*section) {
                    apply(section);
                    changed += 1;
                }
            }
        });
        changed
    }
}

/// Ids from a root down to `id`, inclusive.
pub fn find_path(nodes: &[Node], id: &str) -> Option<Vec<String>> {
    for node in nodes {
        if node.id() == id {
            return Some(vec![node.id().to_string()]);
        }
        if let Some(mut rest) = find_path(node.children(), id) {
            rest.insert(0, node.id().to_string());
            return Some(rest);
        }
    }
    None
}

fn collect_expandable(node: &Node, ids: &mut Vec<String>) {
    if node.has_children() {
        ids.push(node.id().to_string());
        for child in node.children() {
            collect_expandable(child, ids);
        }
    }
}
