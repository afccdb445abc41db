use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing::info;

use direct_reply::channels::{BackendEndpoints, BackendFactory, HttpBackendFactory};
use direct_reply::config::ServiceConfig;
use direct_reply::llm::{HttpGenerator, ReplyGenerator};
use direct_reply::pipeline::{DispatchPipeline, ReplyPipeline, SyncPipeline};
use direct_reply::scheduler::spawn_loop;
use direct_reply::server::health_routes;
use direct_reply::store::{HttpStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().context("invalid service configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = %config.storage_url,
        port = config.port,
        "Direct Reply starting"
    );

    let storage: Arc<dyn Storage> = Arc::new(HttpStorage::new(config.storage_url.clone()));
    let generator: Arc<dyn ReplyGenerator> = Arc::new(HttpGenerator::new(&config.generation_url));
    let backends: Arc<dyn BackendFactory> = Arc::new(HttpBackendFactory::new(BackendEndpoints {
        session_url: config.session_url.clone(),
        private_api_url: config.private_api_url.clone(),
        graph_api_url: config.graph_api_url.clone(),
    }));

    // ── Health endpoint ───────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_routes()).await {
            tracing::error!(error = %e, "Health server stopped");
        }
    });
    info!(port = config.port, "Health server started");

    // ── Poll loops ────────────────────────────────────────────────────────
    let sync = SyncPipeline::new(
        Arc::clone(&storage),
        Arc::clone(&backends),
        ReplyPipeline::new(Arc::clone(&storage), generator),
    );
    let dispatch = DispatchPipeline::new(storage, backends, config.pacing);

    let (sync_handle, sync_shutdown) = spawn_loop(Arc::new(sync), config.sync_interval);
    let (dispatch_handle, dispatch_shutdown) =
        spawn_loop(Arc::new(dispatch), config.dispatch_interval);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested, stopping loops after their current cycle");

    sync_shutdown.store(true, Ordering::Relaxed);
    dispatch_shutdown.store(true, Ordering::Relaxed);
    let _ = tokio::join!(sync_handle, dispatch_handle);

    Ok(())
}
