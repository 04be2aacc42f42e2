//! Common test utilities for easel integration tests.
//!
//! `MockComfy` stands in for a ComfyUI instance: tests mount the routes a
//! scenario needs and can inspect every workflow body the server submitted.
//! Registries and defaults are in-memory and per-test - no shared state.

use easel::api::service::EaselServer;
use easel::asset_registry::AssetRegistry;
use easel::comfy::ComfyClient;
use easel::defaults::DefaultsManager;
use easelconf::{BackendConfig, DefaultsConfig};
use rmcp::model::{CallToolResult, RawContent};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Responder that records every request body before answering.
#[derive(Clone)]
struct CapturingResponder {
    store: Arc<Mutex<Vec<Value>>>,
    template: ResponseTemplate,
}

impl Respond for CapturingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if let Ok(body) = serde_json::from_slice::<Value>(&request.body) {
            self.store.lock().expect("mutex").push(body);
        }
        self.template.clone()
    }
}

/// A stand-in ComfyUI backend on an ephemeral port.
pub struct MockComfy {
    pub server: MockServer,
    submitted: Arc<Mutex<Vec<Value>>>,
}

impl MockComfy {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// POST /prompt answering with `prompt_id`, recording each submitted body.
    pub async fn mount_submit(&self, prompt_id: &str) {
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(self.capture_submit(prompt_id))
            .mount(&self.server)
            .await;
    }

    /// Like `mount_submit`, but consumed after one request so a mock mounted
    /// later answers the next submission.
    pub async fn mount_submit_once(&self, prompt_id: &str) {
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(self.capture_submit(prompt_id))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    fn capture_submit(&self, prompt_id: &str) -> CapturingResponder {
        CapturingResponder {
            store: self.submitted.clone(),
            template: ResponseTemplate::new(200)
                .set_body_json(json!({ "prompt_id": prompt_id })),
        }
    }

    /// GET /history/{prompt_id} answering with the entry keyed by id, the
    /// way the backend shapes it.
    pub async fn mount_history(&self, prompt_id: &str, entry: Value) {
        let mut history = serde_json::Map::new();
        history.insert(prompt_id.to_string(), entry);

        Mock::given(method("GET"))
            .and(path(format!("/history/{prompt_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Object(history)))
            .mount(&self.server)
            .await;
    }

    /// GET /queue with the given running and pending prompt ids.
    pub async fn mount_queue(&self, running: &[&str], pending: &[&str]) {
        let entries =
            |ids: &[&str]| -> Vec<Value> { ids.iter().map(|id| json!([0, id, {}])).collect() };

        Mock::given(method("GET"))
            .and(path("/queue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "queue_running": entries(running),
                "queue_pending": entries(pending),
            })))
            .mount(&self.server)
            .await;
    }

    /// Every workflow body POSTed to /prompt so far, oldest first.
    pub fn submitted(&self) -> Vec<Value> {
        self.submitted.lock().expect("mutex").clone()
    }
}

/// History entry for a completed job with a single image output.
pub fn completed_entry(filename: &str) -> Value {
    json!({
        "status": {"status_str": "success", "completed": true, "messages": []},
        "outputs": {
            "9": {"images": [
                {"filename": filename, "subfolder": "", "type": "output"}
            ]}
        }
    })
}

/// Server wired to the mock backend, polling fast enough for tests.
pub fn server_for(mock: &MockComfy) -> EaselServer {
    let comfy = Arc::new(ComfyClient::from_config(&BackendConfig {
        base_url: mock.uri(),
        poll_interval_ms: 10,
        poll_deadline_ms: 2_000,
        ..BackendConfig::default()
    }));
    EaselServer::new(
        comfy,
        Arc::new(AssetRegistry::new(24)),
        Arc::new(DefaultsManager::new(&DefaultsConfig::default())),
    )
}

/// Parse the JSON text block of a successful tool result.
pub fn response_json(result: &CallToolResult) -> Value {
    assert_ne!(
        result.is_error,
        Some(true),
        "expected a success result, got {:?}",
        result.content
    );
    text_json(result)
}

/// Parse the structured payload of an error tool result.
pub fn error_payload(result: &CallToolResult) -> Value {
    assert_eq!(result.is_error, Some(true), "expected an error result");
    text_json(result)
}

fn text_json(result: &CallToolResult) -> Value {
    let text = result
        .content
        .first()
        .and_then(|content| match &content.raw {
            RawContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .expect("tool result should carry a text block");
    serde_json::from_str(text).expect("tool result text should be JSON")
}
