// crates/server/src/routes/builds.rs
//! Build submission.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::jobs::{BuildAccepted, BuildRequest};
use crate::state::AppState;

/// POST /api/projects/{project_id}/build
///
/// Answers 202 as soon as the job is scheduled. Progress is only available on
/// `WS /ws/build/{project_id}`.
pub async fn start_build(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    body: Result<Json<BuildRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BuildAccepted>)> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let accepted = state
        .launcher
        .launch(&project_id, &request.prompt, &request.project_type)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/projects/{project_id}/build", post(start_build))
}
