//! Backing store abstraction.
//!
//! Defines the [`TreeStore`] trait so the row source and the navigator service
//! can run against Supabase in production and an in-memory store in tests.

use crate::criteria::StructuralFilters;
use crate::schema::Row;

/// Read/write operations the navigator needs from the backing store.
#[async_trait::async_trait]
pub trait TreeStore: Send + Sync {
    /// Fetch one page of tree rows in the store's default order.
    async fn fetch_tree_rows(
        &self,
        filters: &StructuralFilters,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Row>>;

    /// Projects managed by `viewer_id` that have no sections yet.
    async fn fetch_own_projects_without_sections(&self, viewer_id: &str)
        -> anyhow::Result<Vec<Row>>;

    async fn set_section_status(
        &self,
        section_id: &str,
        status_id: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn set_project_favorite(
        &self,
        project_id: &str,
        viewer_id: &str,
        favorite: bool,
    ) -> anyhow::Result<()>;

    async fn update_project_status(&self, project_id: &str, status: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
pub mod memory {
    //! In-memory [`TreeStore`] with failure injection.

    use super::TreeStore;
    use crate::criteria::StructuralFilters;
    use crate::schema::Row;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};

    #[derive(Debug, Clone, Default)]
    pub struct MemoryStore {
        pub rows: Arc<RwLock<Vec<Row>>>,
        pub own_projects: Arc<RwLock<Vec<Row>>>,
        pub fail_fetch_at_offset: Arc<RwLock<Option<usize>>>,
        pub fail_writes: Arc<AtomicBool>,
        pub page_requests: Arc<AtomicUsize>,
    }

    impl MemoryStore {
        pub fn new(rows: Vec<Row>) -> Self {
            Self {
                rows: Arc::new(RwLock::new(rows)),
                ..Default::default()
            }
        }

        pub fn with_own_projects(self, rows: Vec<Row>) -> Self {
            *self.own_projects.write().unwrap() = rows;
            self
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn page_requests(&self) -> usize {
            self.page_requests.load(Ordering::SeqCst)
        }

        fn check_write(&self) -> anyhow::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("write rejected by memory store");
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl TreeStore for MemoryStore {
        async fn fetch_tree_rows(
            &self,
            _filters: &StructuralFilters,
            offset: usize,
            limit: usize,
        ) -> anyhow::Result<Vec<Row>> {
            self.page_requests.fetch_add(1, Ordering::SeqCst);
            if *self.fail_fetch_at_offset.read().unwrap() == Some(offset) {
                anyhow::bail!("fetch failed at offset {}", offset);
            }
            let rows = self.rows.read().unwrap();
            Ok(rows.iter().skip(offset).take(limit).cloned().collect())
        }

        async fn fetch_own_projects_without_sections(
            &self,
            _viewer_id: &str,
        ) -> anyhow::Result<Vec<Row>> {
            Ok(self.own_projects.read().unwrap().clone())
        }

        async fn set_section_status(
            &self,
            section_id: &str,
            status_id: Option<&str>,
        ) -> anyhow::Result<()> {
            self.check_write()?;
            for row in self.rows.write().unwrap().iter_mut() {
                if row.section_id.as_deref() == Some(section_id) {
                    row.status_id = status_id.map(str::to_string);
                }
            }
            Ok(())
        }

        async fn set_project_favorite(
            &self,
            project_id: &str,
            _viewer_id: &str,
            favorite: bool,
        ) -> anyhow::Result<()> {
            self.check_write()?;
            for row in self.rows.write().unwrap().iter_mut() {
                if row.project_id.as_deref() == Some(project_id) {
                    row.is_favorite = favorite;
                }
            }
            Ok(())
        }

        async fn update_project_status(
            &self,
            project_id: &str,
            status: &str,
        ) -> anyhow::Result<()> {
            self.check_write()?;
            for row in self.rows.write().unwrap().iter_mut() {
                if row.project_id.as_deref() == Some(project_id) {
                    row.project_status = Some(status.to_string());
                }
            }
            Ok(())
        }
    }
}
