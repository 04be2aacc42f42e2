use crate::api::responses::GenerationResponse;
use crate::api::schema::{
    GenerateAudioRequest, GenerateImageRequest, GenerateVideoRequest, RegenerateRequest,
};
use crate::api::service::EaselServer;
use crate::api::tools::error_result;
use crate::asset_registry::{compute_url, AssetRecord, NewAsset};
use crate::comfy;
use crate::error::EaselError;
use crate::workflow::{random_seed, WorkflowTemplate};
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData as McpError;
use serde_json::{json, Map, Value};

impl EaselServer {
    #[tracing::instrument(
        name = "mcp.tool.generate_image",
        skip(self, request),
        fields(
            prompt.id = tracing::field::Empty,
            asset.id = tracing::field::Empty,
        )
    )]
    pub async fn generate_image(
        &self,
        request: GenerateImageRequest,
    ) -> Result<CallToolResult, McpError> {
        let want_preview = request.return_inline_preview.unwrap_or(false);
        let template = WorkflowTemplate::generate_image();
        match self
            .run_generation(&template, "image", request.provided(), want_preview)
            .await
        {
            Ok(outcome) => finish(outcome),
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tracing::instrument(
        name = "mcp.tool.generate_audio",
        skip(self, request),
        fields(
            prompt.id = tracing::field::Empty,
            asset.id = tracing::field::Empty,
        )
    )]
    pub async fn generate_audio(
        &self,
        request: GenerateAudioRequest,
    ) -> Result<CallToolResult, McpError> {
        let template = WorkflowTemplate::generate_audio();
        match self
            .run_generation(&template, "audio", request.provided(), false)
            .await
        {
            Ok(outcome) => finish(outcome),
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tracing::instrument(
        name = "mcp.tool.generate_video",
        skip(self, request),
        fields(
            prompt.id = tracing::field::Empty,
            asset.id = tracing::field::Empty,
        )
    )]
    pub async fn generate_video(
        &self,
        request: GenerateVideoRequest,
    ) -> Result<CallToolResult, McpError> {
        let template = WorkflowTemplate::generate_video();
        match self
            .run_generation(&template, "video", request.provided(), false)
            .await
        {
            Ok(outcome) => finish(outcome),
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tracing::instrument(
        name = "mcp.tool.regenerate",
        skip(self, request),
        fields(
            asset.source_id = %request.asset_id,
            prompt.id = tracing::field::Empty,
            asset.id = tracing::field::Empty,
        )
    )]
    pub async fn regenerate(
        &self,
        request: RegenerateRequest,
    ) -> Result<CallToolResult, McpError> {
        let want_preview = request.return_inline_preview.unwrap_or(false);
        match self.run_regenerate(&request, want_preview).await {
            Ok(outcome) => finish(outcome),
            Err(e) => Ok(error_result(&e)),
        }
    }

    /// Resolve defaults, render, submit once, wait, register once.
    async fn run_generation(
        &self,
        template: &WorkflowTemplate,
        namespace: &str,
        provided: Map<String, Value>,
        want_preview: bool,
    ) -> Result<GenerationOutcome, EaselError> {
        let mut params = self.defaults.resolve(namespace, &provided);

        // The video graph wants a frame count; callers speak in seconds.
        // Latent length is 4k+1, which duration*fps+1 satisfies for whole
        // seconds at the stock frame rates.
        if template.id == "generate_video" {
            let duration = params.get("duration").and_then(Value::as_f64).unwrap_or(5.0);
            let fps = params.get("fps").and_then(Value::as_f64).unwrap_or(16.0);
            let frames = (duration * fps).round() as i64 + 1;
            params.insert("frames".to_string(), json!(frames));
        }

        let graph = template.render(&params)?;
        self.submit_and_register(template.id, graph, params, want_preview)
            .await
    }

    /// Clone the stored workflow, rebind the overridden parameters, resubmit.
    async fn run_regenerate(
        &self,
        request: &RegenerateRequest,
        want_preview: bool,
    ) -> Result<GenerationOutcome, EaselError> {
        let record = self.registry.get(&request.asset_id).ok_or_else(|| {
            EaselError::not_found(format!("No asset found with ID: {}", request.asset_id))
        })?;

        let template = WorkflowTemplate::by_id(&record.workflow_id).ok_or_else(|| {
            EaselError::validation(format!(
                "asset {} was produced by unknown workflow {}",
                record.asset_id, record.workflow_id
            ))
        })?;

        let mut overrides = request.param_overrides.clone().unwrap_or_default();
        if let Some(seed) = request.seed {
            overrides.insert("seed".to_string(), json!(seed));
        } else if !overrides.contains_key("seed") {
            // Unpinned re-runs sample fresh; the backend dedupes identical
            // submissions otherwise.
            overrides.insert("seed".to_string(), json!(random_seed()));
        }

        let graph = template.apply_overrides(&record.submitted_workflow, &overrides)?;

        let mut params = record
            .metadata
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for (name, value) in &overrides {
            params.insert(name.clone(), value.clone());
        }

        self.submit_and_register(template.id, graph, params, want_preview)
            .await
    }

    async fn submit_and_register(
        &self,
        workflow_id: &'static str,
        graph: Value,
        params: Map<String, Value>,
        want_preview: bool,
    ) -> Result<GenerationOutcome, EaselError> {
        let prompt_id = self.comfy.submit(&graph).await?;
        tracing::Span::current().record("prompt.id", prompt_id.as_str());

        let entry = self.comfy.wait_for_completion(&prompt_id).await?;
        if let Some(detail) = comfy::history_error_detail(&entry) {
            return Err(EaselError::BackendError(format!(
                "job {prompt_id} failed: {detail}"
            )));
        }

        let identity = comfy::collect_outputs(&entry)
            .into_iter()
            .next()
            .ok_or_else(|| {
                EaselError::BackendError(format!("job {prompt_id} produced no outputs"))
            })?;
        let mime_type = comfy::mime_type_for(&identity.filename);

        // Best effort: a preview fetch failing never fails the generation.
        let preview_bytes = if want_preview && mime_type.starts_with("image/") {
            match self.comfy.fetch_view(&identity).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(error = %e, filename = %identity.filename,
                        "inline preview fetch failed");
                    None
                }
            }
        } else {
            None
        };

        let width = params.get("width").and_then(Value::as_u64).map(|v| v as u32);
        let height = params
            .get("height")
            .and_then(Value::as_u64)
            .map(|v| v as u32);

        let mut new_asset = NewAsset::new(identity, &prompt_id, workflow_id, graph, entry)
            .with_mime_type(mime_type)
            .with_dimensions(width, height)
            .with_metadata(json!({ "params": params }));
        new_asset.bytes_size = preview_bytes.as_ref().map(|b| b.len() as u64);

        let record = self.registry.register(new_asset);
        tracing::Span::current().record("asset.id", record.asset_id.as_str());
        tracing::info!(
            asset_id = %record.asset_id,
            prompt_id = %record.prompt_id,
            workflow_id,
            filename = %record.identity.filename,
            "generation complete"
        );

        let preview = preview_bytes.and_then(|bytes| {
            if bytes.len() <= self.inline_preview_limit {
                use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
                Some(Content::image(BASE64.encode(&bytes), record.mime_type.clone()))
            } else {
                tracing::debug!(bytes = bytes.len(), "inline preview over size cap, omitted");
                None
            }
        });

        Ok(GenerationOutcome {
            response: self.generation_response(&record),
            preview,
        })
    }

    fn generation_response(&self, record: &AssetRecord) -> GenerationResponse {
        GenerationResponse {
            asset_id: record.asset_id.clone(),
            asset_url: compute_url(&record.identity, self.comfy.base_url()),
            prompt_id: record.prompt_id.clone(),
            mime_type: record.mime_type.clone(),
            width: record.width,
            height: record.height,
            bytes_size: (record.bytes_size > 0).then_some(record.bytes_size),
        }
    }
}

struct GenerationOutcome {
    response: GenerationResponse,
    preview: Option<Content>,
}

fn finish(outcome: GenerationOutcome) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(&outcome.response)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize: {}", e), None))?;
    let mut contents = vec![Content::text(json)];
    if let Some(preview) = outcome.preview {
        contents.push(preview);
    }
    Ok(CallToolResult::success(contents))
}
