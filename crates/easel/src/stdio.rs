//! Stdio MCP transport for Claude Code and other stdio-based clients.
//!
//! Stdout carries the MCP protocol; startup warnings go to stderr.

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;
use tracing::info;

use crate::api::handler::EaselHandler;
use crate::api::service::EaselServer;

/// Run MCP server over stdio (stdin/stdout).
pub async fn run(server: Arc<EaselServer>) -> Result<()> {
    // Probe the backend once so a misconfigured URL shows up at startup
    // instead of on the first tool call.
    if let Err(e) = server.comfy.queue().await {
        eprintln!(
            "Warning: ComfyUI backend not reachable at {}: {}",
            server.comfy.base_url(),
            e
        );
    }

    let handler = EaselHandler::new(server);

    // Serve via stdio - rmcp handles JSON-RPC framing
    let service = handler
        .serve(stdio())
        .await
        .context("Failed to start stdio MCP service")?;

    info!("Stdio MCP server running");

    // Wait for completion (EOF or error)
    service.waiting().await?;

    info!("Stdio MCP server shutdown");
    Ok(())
}
