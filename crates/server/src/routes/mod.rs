//! Route handlers for the xapp build server.

pub mod builds;
pub mod health;
pub mod metrics;
pub mod projects;
pub mod stream;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  / - Liveness banner
/// - GET  /api/health - Health check with live build/subscriber counts
/// - GET  /api/projects - List project records
/// - POST /api/projects - Create a project record
/// - POST /api/projects/{project_id}/build - Start a build (202, returns immediately)
/// - WS   /ws/build/{project_id} - Newline-terminated JSON build events
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(health::router())
        .merge(projects::router())
        .merge(builds::router());

    Router::new()
        .route("/", get(health::root))
        .nest("/api", api)
        .merge(stream::router())
        .merge(metrics::router())
        .with_state(state)
}
