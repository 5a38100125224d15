//! Supabase (PostgREST) implementation of the backing store.

use anyhow::{anyhow, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::json;
use tracing::debug;

use crate::criteria::{ManagerFilter, StructuralFilters};
use crate::schema::Row;
use crate::store::TreeStore;

const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_TREE_VIEW: &str = "view_project_tree";
const RETURN_MINIMAL: &str = "return=minimal";

/// Supabase client configuration.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
    schema: String,
    tree_view: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            tree_view: DEFAULT_TREE_VIEW.to_string(),
        }
    }

    /// Create a new Supabase client from environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("SUPABASE_URL").map_err(|_| anyhow!("SUPABASE_URL not set"))?;
        let service_role_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| anyhow!("SUPABASE_SERVICE_ROLE_KEY not set"))?;

        let mut client = Self::new(base_url, service_role_key);
        if let Ok(schema) = std::env::var("SUPABASE_SCHEMA") {
            client.schema = schema;
        }
        if let Ok(view) = std::env::var("NAVIGATOR_TREE_VIEW") {
            client.tree_view = view;
        }
        Ok(client)
    }

    /// Request against `/rest/v1/{table}` with auth and profile headers.
    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let profile_header = if method == Method::GET {
            "Accept-Profile"
        } else {
            "Content-Profile"
        };
        self.client
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header(profile_header, &self.schema)
    }

    /// Helper: GET rows from a table or view.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self.request(Method::GET, table).query(query).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Supabase GET {} failed: {} - {}", table, status, text));
        }

        Ok(resp.json().await?)
    }

    /// Helper: send a write with a `Prefer` header and only check the status.
    async fn write(&self, builder: RequestBuilder, prefer: &str, what: &str) -> Result<()> {
        let resp = builder.header("Prefer", prefer).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to {}: {} - {}", what, status, text));
        }

        debug!("Supabase write ok: {}", what);
        Ok(())
    }
}

/// PostgREST query parameters for the structural filters.
fn filter_params(filters: &StructuralFilters) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    match &filters.manager {
        ManagerFilter::Any => {}
        ManagerFilter::Manager(id) => params.push(("manager_id", format!("eq.{}", id))),
        ManagerFilter::Unassigned => params.push(("manager_id", "is.null".to_string())),
    }
    let optional = [
        ("project_id", &filters.project_id),
        ("stage_id", &filters.stage_id),
        ("object_id", &filters.object_id),
        ("department_id", &filters.department_id),
        ("team_id", &filters.team_id),
        ("employee_id", &filters.employee_id),
    ];
    for (column, value) in optional {
        if let Some(value) = value {
            params.push((column, format!("eq.{}", value)));
        }
    }
    params
}

#[async_trait::async_trait]
impl TreeStore for SupabaseClient {
    async fn fetch_tree_rows(
        &self,
        filters: &StructuralFilters,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Row>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        query.extend(filter_params(filters));
        self.get_json(&self.tree_view, &query).await
    }

    async fn fetch_own_projects_without_sections(&self, viewer_id: &str) -> Result<Vec<Row>> {
        let query = [
            ("select", "*".to_string()),
            ("manager_id", format!("eq.{}", viewer_id)),
            ("section_id", "is.null".to_string()),
        ];
        self.get_json(&self.tree_view, &query).await
    }

    async fn set_section_status(&self, section_id: &str, status_id: Option<&str>) -> Result<()> {
        let builder = self
            .request(Method::PATCH, "sections")
            .query(&[("section_id", format!("eq.{}", section_id))])
            .json(&json!({ "section_status_id": status_id }));
        self.write(builder, RETURN_MINIMAL, &format!("set status of section {}", section_id))
            .await
    }

    async fn set_project_favorite(
        &self,
        project_id: &str,
        viewer_id: &str,
        favorite: bool,
    ) -> Result<()> {
        let what = format!("set favorite on project {}", project_id);
        if favorite {
            let builder = self
                .request(Method::POST, "user_favorite_projects")
                .json(&json!({ "user_id": viewer_id, "project_id": project_id }));
            self.write(builder, "resolution=ignore-duplicates,return=minimal", &what)
                .await
        } else {
            let builder = self.request(Method::DELETE, "user_favorite_projects").query(&[
                ("user_id", format!("eq.{}", viewer_id)),
                ("project_id", format!("eq.{}", project_id)),
            ]);
            self.write(builder, RETURN_MINIMAL, &what).await
        }
    }

    async fn update_project_status(&self, project_id: &str, status: &str) -> Result<()> {
        let builder = self
            .request(Method::PATCH, "projects")
            .query(&[("project_id", format!("eq.{}", project_id))])
            .json(&json!({ "project_status": status }));
        self.write(builder, RETURN_MINIMAL, &format!("update status of project {}", project_id))
            .await
    }
}
