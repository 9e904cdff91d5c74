// crates/server/src/routes/health.rs
//! Health check endpoints.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_builds: usize,
    pub live_projects: usize,
    pub live_subscribers: usize,
    pub project_store: String,
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
}

/// GET /api/health - Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        active_builds: state.launcher.active_builds(),
        live_projects: state.registry.project_count(),
        live_subscribers: state.registry.total_subscribers(),
        project_store: state.store.name().to_string(),
    })
}

/// GET / - liveness banner.
pub async fn root() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "xAppBuilder backend running",
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
