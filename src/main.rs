//! Project Navigator - project/stage/object/section tree synchronization server.

mod commands;
mod config;
mod criteria;
mod error;
mod filters;
mod navigator;
mod row_source;
mod schema;
mod service;
mod sorter;
mod store;
mod supabase;
mod tree_builder;
mod view_state;
mod view_store;

#[cfg(test)]
mod fixtures;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use commands::{Command, CommandBus};
use config::NavigatorConfig;
use criteria::{FilterCriteria, StructuralFilters};
use error::NavigatorError;
use navigator::{StatusDisplay, TreeSnapshot};
use serde::{Deserialize, Serialize};
use service::NavigatorService;
use supabase::SupabaseClient;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    service: NavigatorService,
    bus: CommandBus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "project_navigator=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NavigatorConfig::from_env()?;
    info!(
        "Paging: {} rows per page, ceiling at offset {}",
        config.paging.page_size, config.paging.max_offset
    );

    let supabase = SupabaseClient::from_env()?;
    info!("Supabase client initialized");

    let service = NavigatorService::new(Arc::new(supabase), &config);
    let bus = CommandBus::default();
    service.spawn_listener(&bus);

    // The server still comes up on a failed first load; a reload command retries.
    if let Err(e) = service.reload().await {
        error!("Initial load failed: {}", e);
    }

    let state = AppState { service, bus };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/tree", get(get_tree))
        .route("/commands", post(publish_command))
        .route("/filters", put(set_filters))
        .route("/scope", put(set_scope))
        .route("/sections/:id/status", post(assign_section_status))
        .route("/projects/:id/favorite", post(toggle_favorite))
        .route("/projects/:id/status", post(change_project_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Run server
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Server listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

type HandlerError = (StatusCode, String);

fn into_response_error(err: NavigatorError) -> HandlerError {
    let status = match &err {
        NavigatorError::Load(_) | NavigatorError::Write(_) => StatusCode::BAD_GATEWAY,
        NavigatorError::Config(_) => StatusCode::BAD_REQUEST,
        NavigatorError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Visible forest plus view state.
async fn get_tree(State(state): State<AppState>) -> Json<TreeSnapshot> {
    Json(state.service.snapshot())
}

#[derive(Serialize)]
struct Published {
    delivered: usize,
}

/// Publish a command on the bus; the listener applies it asynchronously.
async fn publish_command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> (StatusCode, Json<Published>) {
    let delivered = state.bus.publish(command);
    (StatusCode::ACCEPTED, Json(Published { delivered }))
}

/// Replace the in-memory filter criteria.
async fn set_filters(
    State(state): State<AppState>,
    Json(criteria): Json<FilterCriteria>,
) -> Json<TreeSnapshot> {
    state.service.set_criteria(criteria);
    Json(state.service.snapshot())
}

/// Replace the structural filters and reload.
async fn set_scope(
    State(state): State<AppState>,
    Json(filters): Json<StructuralFilters>,
) -> Result<Json<TreeSnapshot>, HandlerError> {
    state
        .service
        .set_structural_filters(filters)
        .await
        .map_err(into_response_error)?;
    Ok(Json(state.service.snapshot()))
}

#[derive(Deserialize)]
struct SectionStatusBody {
    status: Option<StatusDisplay>,
}

async fn assign_section_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SectionStatusBody>,
) -> Result<Json<TreeSnapshot>, HandlerError> {
    state
        .service
        .assign_section_status(&id, body.status)
        .await
        .map_err(into_response_error)?;
    Ok(Json(state.service.snapshot()))
}

#[derive(Serialize)]
struct FavoriteResponse {
    favorite: bool,
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FavoriteResponse>, HandlerError> {
    match state.service.toggle_favorite(&id).await {
        Ok(Some(favorite)) => Ok(Json(FavoriteResponse { favorite })),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("Project {} not in tree", id))),
        Err(e) => Err(into_response_error(e)),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatusBody {
    project_status: String,
}

async fn change_project_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProjectStatusBody>,
) -> Result<Json<TreeSnapshot>, HandlerError> {
    state
        .service
        .change_project_status(&id, &body.project_status)
        .await
        .map_err(into_response_error)?;
    Ok(Json(state.service.snapshot()))
}
