//! Local persistence of the interactive view across sessions.
//!
//! Stores the expansion set, grouping flags, sections-only toggle and the
//! active detail tab as one JSON file. Nothing here reaches the backing store.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{NavigatorError, Result};
use crate::view_state::ViewState;

/// Snapshot written to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedView {
    #[serde(flatten)]
    pub view: ViewState,
    #[serde(default)]
    pub only_sections: bool,
}

/// File-backed view store. Without a path every operation is a no-op.
#[derive(Debug, Clone, Default)]
pub struct ViewStore {
    path: Option<PathBuf>,
    last_saved: Arc<RwLock<Option<PersistedView>>>,
}

impl ViewStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            last_saved: Arc::default(),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Load the saved view; a missing or unreadable file yields the default view.
    pub fn load(&self) -> PersistedView {
        let Some(path) = &self.path else {
            return PersistedView::default();
        };
        if !path.exists() {
            return PersistedView::default();
        }

        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                serde_json::from_str::<PersistedView>(&json).map_err(|e| e.to_string())
            });

        match loaded {
            Ok(snapshot) => {
                debug!(
                    "ViewStore: restored {} expanded ids from {:?}",
                    snapshot.view.expanded.len(),
                    path
                );
                *self.last_saved.write().unwrap_or_else(|e| e.into_inner()) =
                    Some(snapshot.clone());
                snapshot
            }
            Err(e) => {
                warn!("ViewStore: ignoring unreadable view file {:?}: {}", path, e);
                PersistedView::default()
            }
        }
    }

    /// Write the snapshot unless it equals the last one written.
    pub fn save(&self, snapshot: &PersistedView) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        {
            let last = self.last_saved.read().unwrap_or_else(|e| e.into_inner());
            if last.as_ref() == Some(snapshot) {
                return Ok(());
            }
        }

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| NavigatorError::Persist(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| NavigatorError::Persist(format!("{:?}: {}", path, e)))?;

        *self.last_saved.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        debug!("ViewStore: saved view to {:?}", path);
        Ok(())
    }
}
