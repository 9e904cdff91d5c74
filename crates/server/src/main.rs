// crates/server/src/main.rs
//! xapp build server binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use xapp_core::llm::GroqGenerator;
use xapp_core::sandbox::LocalSandboxProvider;
use xapp_core::store::{MemoryProjectStore, ProjectStore, SupabaseProjectStore};
use xapp_observability::init_tracing;
use xapp_server::config::{Config, StoreBackend};
use xapp_server::{create_app, init_metrics, AppState, Collaborators};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    let _log_guard = init_tracing(&config.log()).context("initializing tracing")?;

    init_metrics();

    let generator = GroqGenerator::new(config.groq()).context("configuring Groq generator")?;

    let store: Arc<dyn ProjectStore> = match config.store_backend()? {
        StoreBackend::Supabase(supabase) => {
            tracing::info!(url = %supabase.url, "using Supabase project store");
            Arc::new(SupabaseProjectStore::new(supabase).context("configuring Supabase client")?)
        }
        StoreBackend::Memory => {
            tracing::warn!("SUPABASE_URL not set; project records are kept in memory");
            Arc::new(MemoryProjectStore::new())
        }
    };

    let platforms = config.platform_table()?;
    let sandbox_root = config.sandbox_root();
    tracing::info!(
        platforms = ?platforms.names().collect::<Vec<_>>(),
        sandbox_root = %sandbox_root.display(),
        require_known_project = config.require_known_project,
        "build pipeline configured"
    );

    let state = AppState::new(Collaborators {
        sandboxes: Arc::new(LocalSandboxProvider::new(sandbox_root)),
        generator: Arc::new(generator),
        store,
        platforms,
        require_known_project: config.require_known_project,
    });
    let app = create_app(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "xapp-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
