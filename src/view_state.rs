//! Interactive view state: expansion set, grouping flags, focus request.
//!
//! Every transition consumes the previous state and returns the next one, so
//! callers always replace the whole state and never observe a partial update.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::GroupingMode;

/// A pending scroll-into-view request. `seq` distinguishes repeated requests
/// for the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusRequest {
    pub id: String,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub expanded: BTreeSet<String>,
    pub group_by_client: bool,
    pub show_managers: bool,
    pub active_tab: Option<String>,
    #[serde(skip)]
    pub status_management_open: bool,
    #[serde(skip)]
    pub focus: Option<FocusRequest>,
    #[serde(skip)]
    focus_seq: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            expanded: BTreeSet::new(),
            group_by_client: false,
            show_managers: true,
            active_tab: None,
            status_management_open: false,
            focus: None,
            focus_seq: 0,
        }
    }
}

impl ViewState {
    /// Tree shape implied by the grouping flags; client grouping wins.
    pub fn grouping_mode(&self) -> GroupingMode {
        if self.group_by_client {
            GroupingMode::ByClient
        } else if self.show_managers {
            GroupingMode::ByManager
        } else {
            GroupingMode::Flat
        }
    }

    #[cfg(test)]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn toggle_expanded(mut self, id: &str) -> Self {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
        }
        self
    }

    /// Add ids to the expansion set; nothing is collapsed.
    pub fn expand<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expanded.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Back to the canonical top-level view: manager grouping, nothing expanded.
    pub fn collapse_all(mut self) -> Self {
        self.group_by_client = false;
        self.show_managers = true;
        self.expanded.clear();
        self
    }

    pub fn toggle_grouping_by_client(mut self) -> Self {
        self.group_by_client = !self.group_by_client;
        self
    }

    pub fn toggle_show_managers(mut self) -> Self {
        self.show_managers = !self.show_managers;
        self
    }

    pub fn open_status_management(mut self) -> Self {
        self.status_management_open = true;
        self
    }

    pub fn select_tab(mut self, tab: impl Into<String>) -> Self {
        self.active_tab = Some(tab.into());
        self
    }

    /// Replace any pending focus with a new request for `id`.
    pub fn request_focus(mut self, id: &str) -> Self {
        self.focus_seq += 1;
        self.focus = Some(FocusRequest {
            id: id.to_string(),
            seq: self.focus_seq,
        });
        self
    }

    /// Clear the focus request, but only if it is still request `seq`.
    pub fn clear_focus(mut self, seq: u64) -> Self {
        if self.focus.as_ref().is_some_and(|f| f.seq == seq) {
            self.focus = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_mode_from_flags() {
        let view = ViewState::default();
        assert_eq!(view.grouping_mode(), GroupingMode::ByManager);

        let view = view.toggle_show_managers();
        assert_eq!(view.grouping_mode(), GroupingMode::Flat);

        let view = view.toggle_grouping_by_client();
        assert_eq!(view.grouping_mode(), GroupingMode::ByClient);
    }

    #[test]
    fn test_toggle_twice_restores() {
        let view = ViewState::default().toggle_expanded("p1");
        assert!(view.is_expanded("p1"));
        assert!(!view.toggle_expanded("p1").is_expanded("p1"));
    }

    #[test]
    fn test_expand_never_collapses() {
        let view = ViewState::default()
            .expand(["a", "b"])
            .expand(vec!["b".to_string(), "c".to_string()]);
        assert_eq!(view.expanded.len(), 3);
    }

    #[test]
    fn test_collapse_all_resets_grouping() {
        let view = ViewState::default()
            .expand(["a"])
            .toggle_grouping_by_client()
            .toggle_show_managers()
            .collapse_all();
        assert!(view.expanded.is_empty());
        assert!(!view.group_by_client);
        assert!(view.show_managers);
    }

    #[test]
    fn test_stale_focus_clear_is_ignored() {
        let view = ViewState::default().request_focus("x1");
        let first = view.focus.clone().unwrap().seq;
        let view = view.request_focus("x1");
        let second = view.focus.clone().unwrap().seq;
        assert_ne!(first, second);

        let view = view.clear_focus(first);
        assert_eq!(view.focus.as_ref().map(|f| f.seq), Some(second));
        assert!(view.clear_focus(second).focus.is_none());
    }

    #[test]
    fn test_transient_fields_not_persisted() {
        let view = ViewState::default()
            .expand(["p1"])
            .open_status_management()
            .request_focus("p1");
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("focus").is_none());
        assert!(json.get("status_management_open").is_none());

        let restored: ViewState = serde_json::from_value(json).unwrap();
        assert!(restored.is_expanded("p1"));
        assert!(restored.focus.is_none());
    }
}
