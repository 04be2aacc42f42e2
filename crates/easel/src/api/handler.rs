//! MCP handler: tool listing and dispatch.
//!
//! Wraps [`EaselServer`] and implements `rmcp::ServerHandler`.

use rmcp::{
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::schema::*;
use super::service::EaselServer;

/// Generate an input schema from a type that implements schemars::JsonSchema.
///
/// Uses `inline_subschemas` to avoid `$defs`/`$ref` which some MCP clients
/// (like Gemini CLI) don't handle correctly.
fn schema_for<T: schemars::JsonSchema>() -> Arc<serde_json::Map<String, Value>> {
    let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<T>();
    object_schema(serde_json::to_value(&schema).unwrap_or_default())
}

fn object_schema(value: Value) -> Arc<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

fn no_args_schema() -> Arc<serde_json::Map<String, Value>> {
    object_schema(json!({"type": "object", "properties": {}}))
}

fn tool(
    name: &'static str,
    description: &'static str,
    input_schema: Arc<serde_json::Map<String, Value>>,
) -> Tool {
    Tool {
        name: name.into(),
        title: None,
        description: Some(description.into()),
        input_schema,
        annotations: None,
        output_schema: None,
        icons: None,
        meta: None,
    }
}

fn tool_list() -> Vec<Tool> {
    vec![
        // Generation tools
        tool(
            "generate_image",
            "Generate an image from a text prompt via the ComfyUI backend",
            schema_for::<GenerateImageRequest>(),
        ),
        tool(
            "generate_audio",
            "Generate music from style tags and optional lyrics (ACE-Step)",
            schema_for::<GenerateAudioRequest>(),
        ),
        tool(
            "generate_video",
            "Generate a short video clip from a text prompt",
            schema_for::<GenerateVideoRequest>(),
        ),
        tool(
            "regenerate",
            "Re-run a previous generation with parameter tweaks, e.g. {\"steps\": 30}",
            schema_for::<RegenerateRequest>(),
        ),
        // Job tools
        tool(
            "get_job",
            "Get the status of a submitted generation job",
            schema_for::<GetJobRequest>(),
        ),
        tool(
            "get_queue_status",
            "Get the backend's running and pending job queues",
            no_args_schema(),
        ),
        tool(
            "cancel_job",
            "Cancel a queued or running job (no-op if already finished)",
            schema_for::<CancelJobRequest>(),
        ),
        // Asset tools
        tool(
            "list_assets",
            "List generated assets, newest first",
            schema_for::<ListAssetsRequest>(),
        ),
        tool(
            "get_asset_metadata",
            "Get the full provenance record for an asset, including its workflow",
            schema_for::<GetAssetMetadataRequest>(),
        ),
        // Defaults tools
        tool(
            "get_defaults",
            "Show the effective generation defaults for image, audio and video",
            no_args_schema(),
        ),
        tool(
            "set_defaults",
            "Update generation defaults at runtime, optionally persisting to the config file",
            schema_for::<SetDefaultsRequest>(),
        ),
    ]
}

/// Handler wrapper around the tool implementations.
#[derive(Clone)]
pub struct EaselHandler {
    pub server: Arc<EaselServer>,
}

impl EaselHandler {
    pub fn new(server: Arc<EaselServer>) -> Self {
        Self { server }
    }
}

impl ServerHandler for EaselHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Easel exposes a ComfyUI backend as generation tools. generate_image, \
                 generate_audio and generate_video submit a workflow and register the \
                 output as an asset; regenerate re-runs a registered asset with \
                 parameter tweaks; get_defaults/set_defaults manage layered parameter \
                 defaults."
                    .into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: tool_list(),
            next_cursor: None,
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let name = request.name.as_ref();
            let args = Value::Object(request.arguments.clone().unwrap_or_default());

            tracing::debug!(tool = %name, "tool call");

            match name {
                // Generation tools
                "generate_image" => {
                    let request: GenerateImageRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.generate_image(request).await
                }
                "generate_audio" => {
                    let request: GenerateAudioRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.generate_audio(request).await
                }
                "generate_video" => {
                    let request: GenerateVideoRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.generate_video(request).await
                }
                "regenerate" => {
                    let request: RegenerateRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.regenerate(request).await
                }

                // Job tools
                "get_job" => {
                    let request: GetJobRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.get_job(request).await
                }
                "get_queue_status" => self.server.get_queue_status().await,
                "cancel_job" => {
                    let request: CancelJobRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.cancel_job(request).await
                }

                // Asset tools
                "list_assets" => {
                    let request: ListAssetsRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.list_assets(request).await
                }
                "get_asset_metadata" => {
                    let request: GetAssetMetadataRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.get_asset_metadata(request).await
                }

                // Defaults tools
                "get_defaults" => self.server.get_defaults().await,
                "set_defaults" => {
                    let request: SetDefaultsRequest = serde_json::from_value(args)
                        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    self.server.set_defaults(request).await
                }

                _ => Ok(CallToolResult::error(vec![Content::text(format!(
                    "Unknown tool: {}",
                    name
                ))])),
            }
        }
    }
}
