//! MCP server over streamable HTTP.
//!
//! Mounts the rmcp streamable-HTTP service at /mcp plus a plain /health
//! endpoint, and shuts down on SIGINT/SIGTERM.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::api::handler::EaselHandler;
use crate::api::service::EaselServer;

/// Server configuration
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

/// Server state for the health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub server: Arc<EaselServer>,
    pub start_time: Instant,
}

/// Health check endpoint
pub async fn handle_health(
    axum::extract::State(state): axum::extract::State<HealthState>,
) -> axum::Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();

    axum::Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": uptime.as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "backend_url": state.server.comfy.base_url(),
        "registered_assets": state.server.registry.len(),
    }))
}

/// Run the MCP server
pub async fn run(config: ServeConfig, server: Arc<EaselServer>) -> Result<()> {
    info!("🎨 Easel MCP server starting");
    info!("   Port: {}", config.port);
    info!("   Backend: {}", server.comfy.base_url());

    let handler = EaselHandler::new(Arc::clone(&server));
    let mcp_service = StreamableHttpService::new(
        move || Ok(handler.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );

    let health_state = HealthState {
        server: Arc::clone(&server),
        start_time: Instant::now(),
    };

    let health_router = Router::new()
        .route("/health", get(handle_health))
        .with_state(health_state);

    let app = Router::new()
        .nest_service("/mcp", mcp_service)
        .merge(health_router);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🎨 Easel ready!");
    info!("   MCP (Streamable): POST http://{}/mcp", addr);
    info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
