//! Error taxonomy for tool calls.
//!
//! Every tool call resolves to either a success payload or a structured
//! error payload; handlers never panic on bad input or a dead backend.

use serde_json::json;

/// Errors surfaced by tool handlers.
#[derive(Debug, thiserror::Error)]
pub enum EaselError {
    /// Missing or malformed tool parameter. Raised before any backend call.
    #[error("{0}")]
    Validation(String),

    /// Unknown asset_id or prompt_id.
    #[error("{0}")]
    NotFound(String),

    /// The backend could not be reached (connection refused, timeout).
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend was reached but rejected or failed the request.
    #[error("backend error: {0}")]
    BackendError(String),

    /// Local failure that is neither the caller's nor the backend's fault
    /// (e.g. config file write).
    #[error("internal error: {0}")]
    Internal(String),
}

impl EaselError {
    pub fn validation(message: impl Into<String>) -> Self {
        EaselError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        EaselError::NotFound(message.into())
    }

    /// Stable machine-readable code for error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            EaselError::Validation(_) => "validation_error",
            EaselError::NotFound(_) => "not_found",
            EaselError::BackendUnavailable(_) => "backend_unavailable",
            EaselError::BackendError(_) => "backend_error",
            EaselError::Internal(_) => "internal_error",
        }
    }

    /// JSON payload returned to MCP clients in place of a result.
    pub fn to_payload(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

impl From<reqwest::Error> for EaselError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            EaselError::BackendUnavailable(e.to_string())
        } else {
            EaselError::BackendError(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EaselError::validation("bad").code(), "validation_error");
        assert_eq!(EaselError::not_found("gone").code(), "not_found");
        assert_eq!(
            EaselError::BackendUnavailable("refused".into()).code(),
            "backend_unavailable"
        );
        assert_eq!(
            EaselError::BackendError("exploded".into()).code(),
            "backend_error"
        );
    }

    #[test]
    fn test_payload_shape() {
        let payload = EaselError::not_found("no asset with id abc").to_payload();
        assert_eq!(payload["error"]["code"], "not_found");
        assert_eq!(payload["error"]["message"], "no asset with id abc");
    }

    #[test]
    fn test_validation_message_verbatim() {
        let err = EaselError::validation("prompt is required");
        assert_eq!(err.to_string(), "prompt is required");
    }
}
