//! Error types for ckb-mcp.
//!
//! [`ServerError`] covers process-level failures (I/O, config, serialization).
//! [`ToolError`] is the structured business error a tool handler returns; it
//! never becomes a JSON-RPC error but is wrapped into the tool's payload.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Top-level server error.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Engine error: {0}")]
    Engine(#[from] ToolError),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Stable machine-readable codes carried in tool error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameter,
    ResourceNotFound,
    PreconditionFailed,
    OperationFailed,
    BackendUnavailable,
    RateLimited,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::OperationFailed => "OPERATION_FAILED",
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// A business-level failure raised by a tool handler or the engine pool.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    /// Suggested next step for the agent, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the same call later may succeed.
    pub retryable: bool,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            retryable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// A required or well-typed argument is missing or malformed.
    pub fn invalid_parameter(name: &str, detail: impl fmt::Display) -> Self {
        let detail = detail.to_string();
        let message = if detail.is_empty() {
            format!("invalid parameter: {name}")
        } else {
            format!("invalid parameter {name}: {detail}")
        };
        Self::new(ErrorCode::InvalidParameter, message)
    }

    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::new(ErrorCode::ResourceNotFound, format!("{kind} not found: {name}"))
    }

    pub fn precondition(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::new(ErrorCode::PreconditionFailed, message).with_hint(hint)
    }

    pub fn operation(op: &str, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::OperationFailed, format!("{op} failed: {err}"))
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendUnavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Machine-readable code string.
    pub fn code(&self) -> &'static str {
        self.code.as_str()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use test_case::test_case;

    #[test_case(ErrorCode::InvalidParameter, "INVALID_PARAMETER" ; "invalid parameter")]
    #[test_case(ErrorCode::ResourceNotFound, "RESOURCE_NOT_FOUND" ; "not found")]
    #[test_case(ErrorCode::PreconditionFailed, "PRECONDITION_FAILED" ; "precondition")]
    #[test_case(ErrorCode::BackendUnavailable, "BACKEND_UNAVAILABLE" ; "backend")]
    #[test_case(ErrorCode::RateLimited, "RATE_LIMITED" ; "rate limited")]
    fn code_as_str_matches_serde(code: ErrorCode, expected: &str) {
        pa_eq!(code.as_str(), expected);
        let json = serde_json::to_value(code).unwrap();
        pa_eq!(json, serde_json::json!(expected));
    }

    #[test]
    fn invalid_parameter_message() {
        pa_eq!(
            ToolError::invalid_parameter("symbolId", "").message,
            "invalid parameter: symbolId"
        );
        pa_eq!(
            ToolError::invalid_parameter("limit", "must be a number").message,
            "invalid parameter limit: must be a number"
        );
    }

    #[test]
    fn builder_flags() {
        let err = ToolError::internal("pool full").with_hint("retry").retryable();
        assert!(err.retryable);
        pa_eq!(err.hint.as_deref(), Some("retry"));
        pa_eq!(err.code(), "INTERNAL_ERROR");
        pa_eq!(err.to_string(), "INTERNAL_ERROR: pool full");
    }

    #[test]
    fn hint_skipped_when_absent() {
        let json = serde_json::to_value(ToolError::not_found("tool", "x")).unwrap();
        assert!(json.get("hint").is_none());
        pa_eq!(json["code"], "RESOURCE_NOT_FOUND");
        pa_eq!(json["message"], "tool not found: x");
    }

    #[test]
    fn server_error_from_tool_error() {
        let err: ServerError = ToolError::backend_unavailable("no index").into();
        assert!(err.to_string().contains("BACKEND_UNAVAILABLE"));
    }
}
