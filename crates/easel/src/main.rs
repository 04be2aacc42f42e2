//! easel - MCP server exposing a ComfyUI backend as generation tools
//!
//! Subcommands:
//! - `easel serve` - Run the MCP server over streamable HTTP
//! - `easel stdio` - Run the MCP server over stdin/stdout

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use easel::api::service::EaselServer;
use easel::asset_registry::AssetRegistry;
use easel::comfy::{self, ComfyClient};
use easel::defaults::DefaultsManager;
use easel::{serve, stdio, telemetry};
use easelconf::EaselConfig;

#[derive(Parser)]
#[command(name = "easel")]
#[command(about = "MCP server exposing a ComfyUI backend as generation tools")]
#[command(version)]
struct Cli {
    /// Config file path (takes precedence over ./easel.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over streamable HTTP
    Serve {
        /// HTTP port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// ComfyUI base URL (overrides config)
        #[arg(long)]
        comfy_url: Option<String>,

        /// OTLP gRPC endpoint for OpenTelemetry (overrides config)
        #[arg(long)]
        otlp_endpoint: Option<String>,
    },

    /// Run the MCP server over stdio (for Claude Code and similar clients)
    Stdio {
        /// ComfyUI base URL (overrides config)
        #[arg(long)]
        comfy_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = EaselConfig::load_with_sources_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            port,
            comfy_url,
            otlp_endpoint,
        } => {
            if let Some(url) = comfy_url {
                config.infra.backend.base_url = url;
            }
            let endpoint = otlp_endpoint.unwrap_or_else(|| config.infra.telemetry.otlp_endpoint.clone());
            telemetry::init(&endpoint, &config.infra.telemetry.log_level)?;
            log_sources(&sources);

            let server = build_server(&config);
            warn_on_unknown_default_models(&server).await;

            let result = serve::run(
                serve::ServeConfig {
                    host: config.infra.bind.http_host.clone(),
                    port: port.unwrap_or(config.infra.bind.http_port),
                },
                server,
            )
            .await;

            telemetry::shutdown()?;
            result?;
        }

        Commands::Stdio { comfy_url } => {
            if let Some(url) = comfy_url {
                config.infra.backend.base_url = url;
            }
            telemetry::init_stderr(&config.infra.telemetry.log_level);
            log_sources(&sources);

            let server = build_server(&config);
            stdio::run(server).await?;
        }
    }

    Ok(())
}

fn build_server(config: &EaselConfig) -> Arc<EaselServer> {
    let comfy = Arc::new(ComfyClient::from_config(&config.infra.backend));
    let registry = Arc::new(AssetRegistry::new(config.infra.registry.ttl_hours));
    let defaults = Arc::new(DefaultsManager::new(&config.bootstrap.defaults));
    Arc::new(EaselServer::new(comfy, registry, defaults))
}

fn log_sources(sources: &easelconf::ConfigSources) {
    for path in &sources.files {
        info!("   Config: {}", path.display());
    }
    if !sources.env_overrides.is_empty() {
        info!("   Env overrides: {}", sources.env_overrides.join(", "));
    }
}

/// Best-effort startup check: warn when a configured default model is not on
/// the backend. Never fatal; the backend may simply not be up yet.
async fn warn_on_unknown_default_models(server: &EaselServer) {
    let object_info = match server.comfy.object_info().await {
        Ok(info) => info,
        Err(e) => {
            warn!("ComfyUI backend not reachable at {}: {}", server.comfy.base_url(), e);
            return;
        }
    };

    let available = comfy::checkpoint_names(&object_info);
    for (namespace, model) in server.defaults.unknown_default_models(&available) {
        warn!(
            "default model '{}' for {} not found on backend; generations will fail until it is installed or the default is changed",
            model, namespace
        );
    }
}
