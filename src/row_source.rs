//! Paged accumulation of tree rows from the backing store.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::criteria::StructuralFilters;
use crate::schema::Row;
use crate::store::TreeStore;

/// Paging limits for one load.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub page_size: usize,
    /// No page is requested at or beyond this offset.
    pub max_offset: usize,
}

/// Fetch every row matching `filters`, page by page.
///
/// Stops on the first short page or when the offset ceiling is reached, so a
/// result truncated by the ceiling is not a complete fetch. Any page error
/// aborts the whole load.
pub async fn load_rows(
    store: &dyn TreeStore,
    filters: &StructuralFilters,
    paging: Paging,
    viewer_id: Option<&str>,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut offset = 0;
    let mut pages = 0usize;

    loop {
        if offset >= paging.max_offset {
            warn!(
                "Row source stopped at offset ceiling {} ({} rows loaded); tree may be incomplete",
                paging.max_offset,
                rows.len()
            );
            break;
        }

        let page = store
            .fetch_tree_rows(filters, offset, paging.page_size)
            .await
            .with_context(|| format!("Failed to fetch tree rows at offset {}", offset))?;
        pages += 1;

        let len = page.len();
        debug!("Fetched page {} at offset {} ({} rows)", pages, offset, len);
        rows.extend(page);

        if len < paging.page_size {
            break;
        }
        offset += paging.page_size;
    }

    if let Some(viewer_id) = viewer_id {
        if filters.has_organization_filter() && filters.admits_manager(viewer_id) {
            let own = store
                .fetch_own_projects_without_sections(viewer_id)
                .await
                .context("Failed to fetch own projects without sections")?;
            let added = merge_unique(&mut rows, own);
            debug!("Merged {} own projects without sections", added);
        }
    }

    info!("Row source loaded {} rows in {} pages", rows.len(), pages);
    Ok(rows)
}

/// Append rows whose `(project_id, section_id)` key is not already present.
/// Returns the number of rows appended.
fn merge_unique(rows: &mut Vec<Row>, extra: Vec<Row>) -> usize {
    let mut seen: HashSet<(Option<String>, Option<String>)> = rows
        .iter()
        .map(|r| (r.project_id.clone(), r.section_id.clone()))
        .collect();

    let before = rows.len();
    for row in extra {
        if seen.insert((row.project_id.clone(), row.section_id.clone())) {
            rows.push(row);
        }
    }
    rows.len() - before
}
