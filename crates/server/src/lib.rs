// crates/server/src/lib.rs
//! xapp build server library.
//!
//! Axum HTTP + WebSocket surface over the build broadcast layer: a per-project
//! subscriber registry, an event broadcaster, the staged build pipeline and the
//! launcher that supervises it.

pub mod config;
pub mod error;
pub mod jobs;
pub mod live;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::*;
pub use metrics::init_metrics;
pub use routes::api_routes;
pub use state::{AppState, Collaborators};

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API, WebSocket and metrics routes
/// - CORS (any origin; the web client is served separately)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Router Tests
// ============================================================================
