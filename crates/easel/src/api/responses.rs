//! Response types for MCP tool output
//!
//! Every tool serializes one of these to pretty JSON in its text content.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Generation Responses
// ============================================================================

/// Response from generate_image / generate_audio / generate_video / regenerate
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationResponse {
    /// Registry handle for the produced asset
    pub asset_id: String,

    /// Direct download URL on the backend
    pub asset_url: String,

    /// Backend job id, usable with get_job / cancel_job
    pub prompt_id: String,

    pub mime_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_size: Option<u64>,
}

// ============================================================================
// Job Responses
// ============================================================================

/// Job status as reported by the backend queue and history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Running,
    Queued,
    Error,
    NotFound,
}

/// Response from get_job
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusResponse {
    pub prompt_id: String,
    pub status: JobStatus,

    /// Backend failure detail, present only when status is "error"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Output files recorded in history, present when status is "completed"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OutputFile>>,
}

/// One output file named by a finished job's history entry
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutputFile {
    pub filename: String,
    pub subfolder: String,
    pub folder_type: String,
}

/// Response from get_queue_status: the backend's running/pending queues
/// passed through unmodified. Entries are arrays with the prompt id at
/// index 1.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueStatusResponse {
    pub queue_running: serde_json::Value,
    pub queue_pending: serde_json::Value,
}

/// Response from cancel_job
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CancelResponse {
    pub prompt_id: String,

    /// False when the id was not in either queue (already finished or unknown)
    pub success: bool,
}

// ============================================================================
// Asset Responses
// ============================================================================

/// One row from list_assets
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetSummary {
    pub asset_id: String,
    pub filename: String,
    pub asset_url: String,
    pub workflow_id: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Response from list_assets
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetListResponse {
    pub assets: Vec<AssetSummary>,
    pub total: usize,
}

/// Response from get_asset_metadata: the full provenance record
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetMetadataResponse {
    pub asset_id: String,
    pub filename: String,
    pub subfolder: String,
    pub folder_type: String,
    pub asset_url: String,
    pub prompt_id: String,
    pub workflow_id: String,
    pub mime_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    pub bytes_size: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Exact workflow graph sent to the backend, as resubmitted by regenerate
    pub submitted_workflow: serde_json::Value,

    /// Raw history entry from the backend
    pub backend_history: serde_json::Value,

    pub metadata: serde_json::Value,
}

// ============================================================================
// Defaults Responses
// ============================================================================

/// Response from set_defaults
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetDefaultsResponse {
    /// Values applied per namespace
    pub updated: serde_json::Value,

    /// Config file path, present when persist was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted_to: Option<String>,
}
