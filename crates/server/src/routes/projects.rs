// crates/server/src/routes/projects.rs
//! Project record endpoints, backed by the configured project store.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use xapp_core::{NewProject, Project};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/projects - List project records.
pub async fn list_projects(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Project>>> {
    let projects = state.store.list().await?;
    Ok(Json(projects))
}

/// POST /api/projects - Create a project record.
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewProject>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let Json(new_project) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if new_project.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Project name must not be empty".into()));
    }
    let project = state.store.create(new_project).await?;
    tracing::info!(project_id = %project.id, store = state.store.name(), "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/projects", get(list_projects).post(create_project))
}
