//! Navigator service: drives the state container against the backing store.
//!
//! Fetches and writes are the only suspension points. The navigator lock is
//! taken for synchronous mutations and always released before an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands::{Command, CommandBus};
use crate::config::NavigatorConfig;
use crate::criteria::{FilterCriteria, StructuralFilters};
use crate::error::{NavigatorError, Result};
use crate::navigator::{LoadTicket, Navigator, StatusDisplay, TreeSnapshot};
use crate::row_source::{load_rows, Paging};
use crate::schema::NodeKind;
use crate::store::TreeStore;
use crate::view_store::ViewStore;

#[derive(Clone)]
pub struct NavigatorService {
    navigator: Arc<Mutex<Navigator>>,
    store: Arc<dyn TreeStore>,
    view_store: ViewStore,
    paging: Paging,
    viewer_id: Option<String>,
    focus_clear_delay: Duration,
    focus_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl NavigatorService {
    /// Restore the persisted view. The tree stays empty until [`reload`](Self::reload).
    pub fn new(store: Arc<dyn TreeStore>, config: &NavigatorConfig) -> Self {
        let view_store = ViewStore::new(config.view_state_path.clone());
        let navigator = Navigator::from_persisted(view_store.load());
        Self {
            navigator: Arc::new(Mutex::new(navigator)),
            store,
            view_store,
            paging: config.paging,
            viewer_id: config.viewer_id.clone(),
            focus_clear_delay: config.focus_clear_delay,
            focus_timer: Arc::default(),
        }
    }

    fn nav(&self) -> MutexGuard<'_, Navigator> {
        self.navigator.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        self.nav().snapshot()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Refetch with the current structural filters. Returns whether the
    /// result was applied (false when a newer scope superseded it).
    pub async fn reload(&self) -> Result<bool> {
        let ticket = self.nav().begin_load();
        self.run_load(ticket).await
    }

    /// Narrow the row source query and refetch.
    pub async fn set_structural_filters(&self, filters: StructuralFilters) -> Result<bool> {
        let ticket = self.nav().set_structural_filters(filters);
        self.run_load(ticket).await
    }

    async fn run_load(&self, ticket: LoadTicket) -> Result<bool> {
        debug!("Starting load #{}", ticket.generation);
        let result = load_rows(
            self.store.as_ref(),
            &ticket.filters,
            self.paging,
            self.viewer_id.as_deref(),
        )
        .await;

        match result {
            Ok(rows) => {
                let applied = self.nav().finish_load(&ticket, Ok(rows));
                Ok(applied)
            }
            Err(e) => {
                let applied = self.nav().finish_load(&ticket, Err(format!("{:#}", e)));
                if !applied {
                    debug!("Ignoring failure of superseded load #{}: {:#}", ticket.generation, e);
                    return Ok(false);
                }
                error!("Load #{} failed: {:#}", ticket.generation, e);
                Err(NavigatorError::Load(e))
            }
        }
    }

    /// Reload after a rejected write so the optimistic change is dropped.
    async fn recover_from_write(&self, what: &str, err: anyhow::Error) -> NavigatorError {
        warn!("{} failed, reloading: {:#}", what, err);
        if let Err(reload_err) = self.reload().await {
            warn!("Reload after failed write also failed: {}", reload_err);
        }
        NavigatorError::Write(err)
    }

    // ========================================================================
    // View
    // ========================================================================

    pub fn set_criteria(&self, criteria: FilterCriteria) {
        self.update_view(|nav| nav.set_criteria(criteria));
    }

    /// Apply a view mutation, then persist the view.
    fn update_view<T>(&self, apply: impl FnOnce(&mut Navigator) -> T) -> T {
        let (out, persisted) = {
            let mut nav = self.nav();
            let out = apply(&mut *nav);
            (out, nav.persisted())
        };
        if let Err(e) = self.view_store.save(&persisted) {
            warn!("Could not persist view: {}", e);
        }
        out
    }

    /// Expand the path to `id` and request a scroll to it. The request is
    /// cleared after the configured delay unless a newer one replaces it.
    pub fn focus(&self, id: &str) -> Option<u64> {
        let seq = self.update_view(|nav| nav.focus(id))?;
        self.schedule_focus_clear(seq);
        Some(seq)
    }

    fn schedule_focus_clear(&self, seq: u64) {
        let navigator = Arc::clone(&self.navigator);
        let delay = self.focus_clear_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            navigator
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear_focus(seq);
        });

        let previous = self
            .focus_timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Reload, then focus the created node on the fresh tree.
    pub async fn node_created(&self, entity: NodeKind, id: &str) -> Result<Option<u64>> {
        self.reload().await?;
        let seq = self.update_view(|nav| nav.focus_created(id));
        match seq {
            Some(seq) => {
                info!("Focusing created {:?} {}", entity, id);
                self.schedule_focus_clear(seq);
            }
            None => debug!("Created {:?} {} is not visible", entity, id),
        }
        Ok(seq)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Flip a project's favorite flag. Returns the new value, or `None`
    /// when the project is not in the tree.
    pub async fn toggle_favorite(&self, project_id: &str) -> Result<Option<bool>> {
        let viewer_id = self.viewer_id.as_deref().ok_or_else(|| {
            NavigatorError::Config("NAVIGATOR_VIEWER_ID is required for favorites".to_string())
        })?;

        let favorite = {
            let mut nav = self.nav();
            let Some(current) = nav.is_favorite(project_id) else {
                debug!("Favorite toggle for unknown project {}", project_id);
                return Ok(None);
            };
            nav.set_favorite(project_id, !current);
            !current
        };

        if let Err(e) = self
            .store
            .set_project_favorite(project_id, viewer_id, favorite)
            .await
        {
            return Err(self.recover_from_write("Favorite write", e).await);
        }
        Ok(Some(favorite))
    }

    /// Assign (or clear with `None`) a section's status.
    pub async fn assign_section_status(
        &self,
        section_id: &str,
        status: Option<StatusDisplay>,
    ) -> Result<usize> {
        let changed = self.nav().patch_section_status(section_id, status.as_ref());

        let status_id = status.as_ref().map(|s| s.id.as_str());
        if let Err(e) = self.store.set_section_status(section_id, status_id).await {
            return Err(self.recover_from_write("Section status write", e).await);
        }
        Ok(changed)
    }

    pub async fn change_project_status(&self, project_id: &str, status: &str) -> Result<usize> {
        let changed = self.nav().patch_project_status(project_id, status);

        if let Err(e) = self.store.update_project_status(project_id, status).await {
            return Err(self.recover_from_write("Project status write", e).await);
        }
        Ok(changed)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub async fn handle(&self, command: Command) -> Result<()> {
        debug!("Handling {:?}", command);
        match command {
            Command::Reload => {
                self.reload().await?;
            }
            Command::ToggleGroupingByClient => self.update_view(Navigator::toggle_grouping_by_client),
            Command::ToggleShowManagers => self.update_view(Navigator::toggle_show_managers),
            Command::CollapseAll => self.update_view(Navigator::collapse_all),
            Command::OpenStatusManagement => self.update_view(Navigator::open_status_management),
            Command::ToggleOnlyFavorites => self.update_view(Navigator::toggle_only_favorites),
            Command::ResetOnlyFavorites => self.update_view(Navigator::reset_only_favorites),
            Command::NodeCreated { entity, id } => {
                self.node_created(entity, &id).await?;
            }
            Command::FocusNode { id } => {
                self.focus(&id);
            }
            Command::ToggleNode { id } => self.update_view(|nav| nav.toggle_expanded(&id)),
            Command::ExpandAllFrom { id } => {
                self.update_view(|nav| nav.expand_all_from(&id));
            }
            Command::SectionStatusUpdated {
                section_id,
                status_id,
                status_name,
                status_color,
            } => {
                let status = status_id.map(|id| StatusDisplay {
                    id,
                    name: status_name.unwrap_or_default(),
                    color: status_color.unwrap_or_default(),
                });
                self.nav().patch_section_status(&section_id, status.as_ref());
            }
            Command::StatusRenamed {
                status_id,
                status_name,
                status_color,
            } => {
                let changed = self.nav().rename_status(&status_id, &status_name, &status_color);
                debug!("Status {} renamed on {} sections", status_id, changed);
            }
            Command::StatusDeleted { status_id } => {
                let changed = self.nav().delete_status(&status_id);
                debug!("Status {} cleared from {} sections", status_id, changed);
            }
            Command::ProjectStatusUpdated {
                project_id,
                project_status,
            } => {
                self.nav().patch_project_status(&project_id, &project_status);
            }
            Command::SelectDetailTab { tab } => self.update_view(|nav| nav.select_tab(&tab)),
        }
        Ok(())
    }

    /// Handle commands from the bus until it closes.
    pub fn spawn_listener(&self, bus: &CommandBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(command) => {
                        if let Err(e) = service.handle(command).await {
                            error!("Command failed: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Command listener lagged, {} commands dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("Command bus closed, listener stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{row, sample_rows};
    use crate::navigator::LoadStatus;
    use crate::schema::{find_node, Node};
    use crate::store::memory::MemoryStore;

    fn config() -> NavigatorConfig {
        NavigatorConfig {
            viewer_id: Some("me".to_string()),
            focus_clear_delay: Duration::from_millis(50),
            ..Default::default()
        }
    }

    async fn service_with(store: &MemoryStore) -> NavigatorService {
        let service = NavigatorService::new(Arc::new(store.clone()), &config());
        assert!(service.reload().await.unwrap());
        service
    }

    fn root_ids(service: &NavigatorService) -> Vec<String> {
        service
            .snapshot()
            .nodes
            .iter()
            .map(|n| n.id().to_string())
            .collect()
    }

    fn project(snapshot: &TreeSnapshot, id: &str) -> Option<Node> {
        find_node(&snapshot.nodes, id).cloned()
    }

    #[tokio::test]
    async fn test_favorite_rollback_restores_position() {
        let store = MemoryStore::new(vec![row("pa", "Alpha").build(), row("pb", "Beta").build()]);
        let service = service_with(&store).await;
        service.handle(Command::ToggleShowManagers).await.unwrap();
        assert_eq!(root_ids(&service), vec!["pa", "pb"]);

        store.fail_writes(true);
        let err = service.toggle_favorite("pb").await.unwrap_err();
        assert!(matches!(err, NavigatorError::Write(_)));

        assert_eq!(root_ids(&service), vec!["pa", "pb"]);
        match project(&service.snapshot(), "pb") {
            Some(Node::Project(p)) => assert!(!p.is_favorite),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_favorite_toggle_persists_and_reorders() {
        let store = MemoryStore::new(vec![row("pa", "Alpha").build(), row("pb", "Beta").build()]);
        let service = service_with(&store).await;
        service.handle(Command::ToggleShowManagers).await.unwrap();

        assert_eq!(service.toggle_favorite("pb").await.unwrap(), Some(true));
        assert_eq!(root_ids(&service), vec!["pb", "pa"]);

        // the store now agrees, so a reload keeps the order
        service.reload().await.unwrap();
        assert_eq!(root_ids(&service), vec!["pb", "pa"]);

        assert_eq!(service.toggle_favorite("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_favorite_requires_viewer() {
        let store = MemoryStore::new(sample_rows());
        let service = NavigatorService::new(Arc::new(store), &NavigatorConfig::default());
        service.reload().await.unwrap();
        let err = service.toggle_favorite("p1").await.unwrap_err();
        assert!(matches!(err, NavigatorError::Config(_)));
    }

    #[tokio::test]
    async fn test_focus_clears_after_delay() {
        let service = service_with(&MemoryStore::new(sample_rows())).await;

        assert!(service.focus("x1").is_some());
        assert_eq!(
            service.snapshot().focus.map(|f| f.id),
            Some("x1".to_string())
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(service.snapshot().focus.is_none());
        // expansion stays after the focus request is gone
        assert!(service.snapshot().view.is_expanded("o1"));
    }

    #[tokio::test]
    async fn test_new_focus_supersedes_pending_clear() {
        let service = service_with(&MemoryStore::new(sample_rows())).await;

        service.focus("x1");
        tokio::time::sleep(Duration::from_millis(30)).await;
        service.focus("x3");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            service.snapshot().focus.map(|f| f.id),
            Some("x3".to_string())
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(service.snapshot().focus.is_none());
    }

    #[tokio::test]
    async fn test_focus_missing_node_is_noop() {
        let service = service_with(&MemoryStore::new(sample_rows())).await;
        assert_eq!(service.focus("ghost"), None);
        assert!(service.snapshot().view.expanded.is_empty());
    }

    #[tokio::test]
    async fn test_node_created_reloads_then_focuses() {
        let store = MemoryStore::new(sample_rows());
        let service = service_with(&store).await;

        store.rows.write().unwrap().push(
            row("p2", "Project 2")
                .manager("m2", "Bob")
                .stage("s2", "Stage 1")
                .object("o9", "Object New")
                .build(),
        );
        service
            .handle(Command::NodeCreated {
                entity: NodeKind::Object,
                id: "o9".to_string(),
            })
            .await
            .unwrap();

        let snapshot = service.snapshot();
        for id in ["m2", "p2", "s2"] {
            assert!(snapshot.view.is_expanded(id), "{} should be expanded", id);
        }
        assert_eq!(snapshot.focus.map(|f| f.id), Some("o9".to_string()));
    }

    #[tokio::test]
    async fn test_status_assignment_failure_reloads() {
        let store = MemoryStore::new(sample_rows());
        let service = service_with(&store).await;
        store.fail_writes(true);

        let done = StatusDisplay {
            id: "st-done".to_string(),
            name: "Done".to_string(),
            color: "#00ff00".to_string(),
        };
        assert!(service.assign_section_status("x3", Some(done)).await.is_err());

        match find_node(&service.snapshot().nodes, "x3") {
            Some(Node::Section(s)) => assert_eq!(s.status_id.as_deref(), Some("st-plan")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_project_status_change_writes_through() {
        let store = MemoryStore::new(sample_rows());
        let service = service_with(&store).await;

        assert_eq!(service.change_project_status("p2", "paused").await.unwrap(), 1);
        let stored = store.rows.read().unwrap();
        assert!(stored
            .iter()
            .filter(|r| r.project_id.as_deref() == Some("p2"))
            .all(|r| r.project_status.as_deref() == Some("paused")));
    }

    #[tokio::test]
    async fn test_load_failure_is_reported() {
        let store = MemoryStore::new(sample_rows());
        let service = service_with(&store).await;
        *store.fail_fetch_at_offset.write().unwrap() = Some(0);

        let err = service.reload().await.unwrap_err();
        assert!(matches!(err, NavigatorError::Load(_)));
        let snapshot = service.snapshot();
        assert!(snapshot.nodes.is_empty());
        assert!(matches!(snapshot.status, LoadStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_patch_commands_do_not_reload() {
        let store = MemoryStore::new(sample_rows());
        let service = service_with(&store).await;
        let requests = store.page_requests();

        service
            .handle(Command::StatusRenamed {
                status_id: "st-plan".to_string(),
                status_name: "In Progress".to_string(),
                status_color: "#0000ff".to_string(),
            })
            .await
            .unwrap();
        service
            .handle(Command::SectionStatusUpdated {
                section_id: "x2".to_string(),
                status_id: None,
                status_name: None,
                status_color: None,
            })
            .await
            .unwrap();

        assert_eq!(store.page_requests(), requests);
        let snapshot = service.snapshot();
        match find_node(&snapshot.nodes, "x1") {
            Some(Node::Section(s)) => assert_eq!(s.status_name.as_deref(), Some("In Progress")),
            other => panic!("unexpected {:?}", other),
        }
        match find_node(&snapshot.nodes, "x2") {
            Some(Node::Section(s)) => assert!(s.status_id.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_view_changes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let config = NavigatorConfig {
            view_state_path: Some(dir.path().join("view.json")),
            ..config()
        };
        let store = MemoryStore::new(sample_rows());

        let service = NavigatorService::new(Arc::new(store.clone()), &config);
        service.reload().await.unwrap();
        service.handle(Command::ToggleGroupingByClient).await.unwrap();
        service
            .handle(Command::ToggleNode { id: "c1".to_string() })
            .await
            .unwrap();
        service
            .handle(Command::SelectDetailTab { tab: "sections".to_string() })
            .await
            .unwrap();

        let restored = NavigatorService::new(Arc::new(store), &config);
        let view = restored.snapshot().view;
        assert!(view.group_by_client);
        assert!(view.is_expanded("c1"));
        assert_eq!(view.active_tab.as_deref(), Some("sections"));
    }

    #[tokio::test]
    async fn test_listener_handles_published_commands() {
        let service = service_with(&MemoryStore::new(sample_rows())).await;
        let bus = CommandBus::default();
        let listener = service.spawn_listener(&bus);

        assert_eq!(bus.publish(Command::OpenStatusManagement), 1);
        drop(bus);
        listener.await.unwrap();

        assert!(service.snapshot().status_management_open);
    }
}
