//! HTTP client for the ComfyUI backend.
//!
//! Thin wrapper over the REST surface: submit a workflow, read history and
//! queue state, cancel. No retries anywhere; connection failures surface as
//! BackendUnavailable and non-2xx responses as BackendError with the status
//! and body attached.

use crate::asset_registry::AssetIdentity;
use crate::error::EaselError;
use easelconf::BackendConfig;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

/// Client for one ComfyUI instance.
pub struct ComfyClient {
    client: Client,
    base_url: String,
    /// Stable per-process id sent with every submission
    client_id: String,
    poll_interval: Duration,
    poll_deadline: Duration,
}

impl ComfyClient {
    pub fn new(base_url: &str) -> Self {
        Self::from_config(&BackendConfig {
            base_url: base_url.to_string(),
            ..BackendConfig::default()
        })
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: Uuid::new_v4().to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_deadline: Duration::from_millis(config.poll_deadline_ms),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Inject traceparent header for distributed tracing
    fn inject_trace_context(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let span = tracing::Span::current();
        let context = span.context();
        let ctx_span = context.span();
        let span_context = ctx_span.span_context();

        if span_context.is_valid() {
            let flags = if span_context.is_sampled() { "01" } else { "00" };
            let traceparent = format!(
                "00-{}-{}-{}",
                span_context.trace_id(),
                span_context.span_id(),
                flags
            );
            builder.header("traceparent", traceparent)
        } else {
            builder
        }
    }

    /// Submit a rendered workflow. Returns the backend's prompt_id.
    pub async fn submit(&self, workflow: &Value) -> Result<String, EaselError> {
        let body = json!({
            "prompt": workflow,
            "client_id": self.client_id,
        });

        let response = self
            .inject_trace_context(self.client.post(self.url("/prompt")).json(&body))
            .send()
            .await?;
        let response = check("POST /prompt", response).await?;

        let payload: Value = response.json().await?;
        payload["prompt_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                EaselError::BackendError(format!("submit response missing prompt_id: {payload}"))
            })
    }

    /// History for one prompt id. The response is keyed by prompt id; an
    /// unknown id yields an empty object.
    pub async fn history(&self, prompt_id: &str) -> Result<Value, EaselError> {
        let response = self
            .inject_trace_context(
                self.client
                    .get(self.url(&format!("/history/{prompt_id}"))),
            )
            .send()
            .await?;
        let response = check("GET /history", response).await?;
        Ok(response.json().await?)
    }

    /// Current queue state: `queue_running` and `queue_pending` entry lists.
    pub async fn queue(&self) -> Result<Value, EaselError> {
        let response = self
            .inject_trace_context(self.client.get(self.url("/queue")))
            .send()
            .await?;
        let response = check("GET /queue", response).await?;
        Ok(response.json().await?)
    }

    /// Node catalog, used to list available checkpoint names.
    pub async fn object_info(&self) -> Result<Value, EaselError> {
        let response = self
            .inject_trace_context(self.client.get(self.url("/object_info")))
            .send()
            .await?;
        let response = check("GET /object_info", response).await?;
        Ok(response.json().await?)
    }

    /// Cancel a job wherever it currently is: interrupt when running, delete
    /// from the pending queue otherwise. Returns whether the id was found in
    /// either queue; an unknown or already-finished id is not an error.
    pub async fn cancel(&self, prompt_id: &str) -> Result<bool, EaselError> {
        let queue = self.queue().await?;
        let running = queue_contains(&queue, "queue_running", prompt_id);
        let pending = queue_contains(&queue, "queue_pending", prompt_id);

        if running {
            let response = self
                .inject_trace_context(self.client.post(self.url("/interrupt")))
                .send()
                .await?;
            check("POST /interrupt", response).await?;
        }

        if pending {
            let response = self
                .inject_trace_context(
                    self.client
                        .post(self.url("/queue"))
                        .json(&json!({"delete": [prompt_id]})),
                )
                .send()
                .await?;
            check("POST /queue", response).await?;
        }

        Ok(running || pending)
    }

    /// Poll history until the entry for `prompt_id` appears or the deadline
    /// passes. Returns the history entry (which may describe a failed job;
    /// callers inspect its status).
    pub async fn wait_for_completion(&self, prompt_id: &str) -> Result<Value, EaselError> {
        let deadline = tokio::time::Instant::now() + self.poll_deadline;

        loop {
            let history = self.history(prompt_id).await?;
            if let Some(entry) = history.get(prompt_id) {
                if !entry.is_null() {
                    return Ok(entry.clone());
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(EaselError::BackendError(format!(
                    "job {} did not complete within {}s",
                    prompt_id,
                    self.poll_deadline.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Download the bytes behind an asset's `/view` URL.
    pub async fn fetch_view(&self, identity: &AssetIdentity) -> Result<Vec<u8>, EaselError> {
        let url = crate::asset_registry::compute_url(identity, &self.base_url);
        let response = self
            .inject_trace_context(self.client.get(&url))
            .send()
            .await?;
        let response = check("GET /view", response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn check(route: &str, response: reqwest::Response) -> Result<reqwest::Response, EaselError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EaselError::BackendError(format!(
        "{route} returned {status}: {body}"
    )))
}

/// Whether a queue entry list contains a prompt id. Entries are arrays of
/// the form `[number, prompt_id, ...]`.
pub fn queue_contains(queue: &Value, key: &str, prompt_id: &str) -> bool {
    queue
        .get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .any(|entry| entry.get(1).and_then(Value::as_str) == Some(prompt_id))
        })
        .unwrap_or(false)
}

/// Whether a history entry describes a failed job.
///
/// Newer backends report `status.status_str == "error"`; an explicit
/// top-level `error` field also counts.
pub fn history_reports_error(entry: &Value) -> bool {
    if entry.get("error").map(|e| !e.is_null()).unwrap_or(false) {
        return true;
    }
    entry["status"]["status_str"].as_str() == Some("error")
}

/// Failure detail from a history entry, or None when it does not report one.
///
/// The interesting payload is the `execution_error` message's
/// `exception_message`; a top-level `error` field wins when present.
pub fn history_error_detail(entry: &Value) -> Option<String> {
    if !history_reports_error(entry) {
        return None;
    }
    if let Some(error) = entry.get("error").filter(|e| !e.is_null()) {
        return Some(error.to_string());
    }
    let detail = entry["status"]["messages"]
        .as_array()
        .and_then(|messages| {
            messages.iter().find_map(|message| {
                if message.get(0).and_then(Value::as_str) != Some("execution_error") {
                    return None;
                }
                let payload = message.get(1)?;
                Some(
                    payload
                        .get("exception_message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| payload.to_string()),
                )
            })
        })
        .unwrap_or_else(|| "backend reported failure".to_string());
    Some(detail)
}

/// Collect output file identities from a history entry.
///
/// Outputs are keyed by node id, each node carrying arrays of file
/// descriptors under media-specific keys.
pub fn collect_outputs(entry: &Value) -> Vec<AssetIdentity> {
    let mut identities = Vec::new();
    let Some(outputs) = entry.get("outputs").and_then(Value::as_object) else {
        return identities;
    };

    for node_output in outputs.values() {
        for key in ["images", "gifs", "audio"] {
            let Some(files) = node_output.get(key).and_then(Value::as_array) else {
                continue;
            };
            for file in files {
                let Some(filename) = file.get("filename").and_then(Value::as_str) else {
                    continue;
                };
                identities.push(AssetIdentity::new(
                    filename,
                    file.get("subfolder").and_then(Value::as_str).unwrap_or(""),
                    file.get("type").and_then(Value::as_str).unwrap_or("output"),
                ));
            }
        }
    }
    identities
}

/// Checkpoint names advertised by the backend's node catalog.
///
/// Lives at `CheckpointLoaderSimple.input.required.ckpt_name[0]` in the
/// `/object_info` response.
pub fn checkpoint_names(object_info: &Value) -> Vec<String> {
    object_info["CheckpointLoaderSimple"]["input"]["required"]["ckpt_name"][0]
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Best-effort mime type from the output filename.
pub fn mime_type_for(filename: &str) -> &'static str {
    let extension = filename.rsplit('.').next().unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "opus" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_contains() {
        let queue = json!({
            "queue_running": [["exec_1", "prompt_123", {}]],
            "queue_pending": [["exec_2", "prompt_456", {}], ["exec_3", "prompt_789", {}]],
        });

        assert!(queue_contains(&queue, "queue_running", "prompt_123"));
        assert!(queue_contains(&queue, "queue_pending", "prompt_789"));
        assert!(!queue_contains(&queue, "queue_running", "prompt_456"));
        assert!(!queue_contains(&queue, "queue_pending", "prompt_000"));
    }

    #[test]
    fn test_queue_contains_missing_key() {
        let queue = json!({});
        assert!(!queue_contains(&queue, "queue_running", "prompt_123"));
    }

    #[test]
    fn test_history_reports_error() {
        assert!(history_reports_error(&json!({
            "status": {"status_str": "error", "completed": false}
        })));
        assert!(history_reports_error(&json!({
            "error": "CUDA out of memory"
        })));
        assert!(!history_reports_error(&json!({
            "status": {"status_str": "success", "completed": true},
            "outputs": {}
        })));
        // Older backends ship status as a bare list
        assert!(!history_reports_error(&json!({"status": [], "outputs": {}})));
    }

    #[test]
    fn test_history_error_detail() {
        let entry = json!({
            "status": {
                "status_str": "error",
                "completed": false,
                "messages": [
                    ["execution_start", {"prompt_id": "p1"}],
                    ["execution_error", {
                        "node_type": "KSampler",
                        "exception_message": "CUDA out of memory",
                    }],
                ],
            }
        });
        assert_eq!(
            history_error_detail(&entry).as_deref(),
            Some("CUDA out of memory")
        );

        // No messages at all still yields a detail string
        let bare = json!({"status": {"status_str": "error"}});
        assert_eq!(
            history_error_detail(&bare).as_deref(),
            Some("backend reported failure")
        );

        let ok = json!({"status": {"status_str": "success"}, "outputs": {}});
        assert!(history_error_detail(&ok).is_none());
    }

    #[test]
    fn test_collect_outputs() {
        let entry = json!({
            "outputs": {
                "9": {"images": [
                    {"filename": "easel_00001_.png", "subfolder": "", "type": "output"},
                    {"filename": "easel_00002_.png", "subfolder": "batch", "type": "output"},
                ]},
                "7": {"audio": [
                    {"filename": "easel_audio.flac", "subfolder": "", "type": "output"},
                ]},
            },
            "status": {"status_str": "success"},
        });

        let outputs = collect_outputs(&entry);
        assert_eq!(outputs.len(), 3);
        assert!(outputs
            .iter()
            .any(|i| i.filename == "easel_00001_.png" && i.subfolder.is_empty()));
        assert!(outputs
            .iter()
            .any(|i| i.filename == "easel_00002_.png" && i.subfolder == "batch"));
        assert!(outputs.iter().any(|i| i.filename == "easel_audio.flac"));
    }

    #[test]
    fn test_collect_outputs_empty_entry() {
        assert!(collect_outputs(&json!({})).is_empty());
        assert!(collect_outputs(&json!({"outputs": {}})).is_empty());
    }

    #[test]
    fn test_checkpoint_names() {
        let object_info = json!({
            "CheckpointLoaderSimple": {
                "input": {"required": {"ckpt_name": [
                    ["v1-5-pruned-emaonly.ckpt", "sd_xl_base_1.0.safetensors"],
                    {"tooltip": "The name of the checkpoint to load."}
                ]}}
            }
        });

        assert_eq!(
            checkpoint_names(&object_info),
            vec![
                "v1-5-pruned-emaonly.ckpt".to_string(),
                "sd_xl_base_1.0.safetensors".to_string()
            ]
        );
        assert!(checkpoint_names(&json!({})).is_empty());
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("out.png"), "image/png");
        assert_eq!(mime_type_for("OUT.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("song.flac"), "audio/flac");
        assert_eq!(mime_type_for("clip.webp"), "image/webp");
        assert_eq!(mime_type_for("mystery"), "application/octet-stream");
    }
}
