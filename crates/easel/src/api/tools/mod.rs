pub mod assets;
pub mod defaults;
pub mod generate;
pub mod jobs;

use crate::error::EaselError;
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData as McpError;
use serde::Serialize;

/// Serialize a response as the tool's text content.
pub(crate) fn success_json<T: Serialize>(response: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Taxonomy errors become error results with a structured payload, not
/// protocol faults; the caller sees `error.code` and `error.message`.
pub(crate) fn error_result(error: &EaselError) -> CallToolResult {
    let payload = serde_json::to_string_pretty(&error.to_payload())
        .unwrap_or_else(|_| error.to_string());
    CallToolResult::error(vec![Content::text(payload)])
}
