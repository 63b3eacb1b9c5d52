//! Response envelope for tool results.
//!
//! Every `tools/call` result is a JSON envelope serialized into a single text
//! content block. Business failures travel inside the envelope with
//! `isError: true`; they never become JSON-RPC errors.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ToolError;

/// Envelope layout version.
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub schema_version: &'static str,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Envelope {
    pub fn ok(tool: &str, data: Value) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            data,
            error: None,
            meta: Meta::new(tool),
        }
    }

    pub fn err(tool: &str, error: ToolError) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            data: Value::Null,
            error: Some(error),
            meta: Meta::new(tool),
        }
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.meta.duration_ms = Some(ms);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.meta.warnings.push(warning.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The MCP `tools/call` result: one text block holding this envelope.
    pub fn into_call_result(self) -> Value {
        let is_error = self.is_error();
        let text = serde_json::to_string(&self).unwrap_or_else(|e| {
            json!({
                "schemaVersion": SCHEMA_VERSION,
                "data": null,
                "error": { "code": "INTERNAL_ERROR", "message": format!("marshal response: {e}"), "retryable": false },
                "meta": { "tool": self.meta.tool },
            })
            .to_string()
        });
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error,
        })
    }
}

impl Meta {
    fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            duration_ms: None,
            warnings: Vec::new(),
        }
    }
}

/// Parse the envelope back out of a `tools/call` result.
pub fn envelope_text(call_result: &Value) -> Option<Value> {
    let text = call_result
        .get("content")?
        .get(0)?
        .get("text")?
        .as_str()?;
    serde_json::from_str(text).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use pretty_assertions::assert_eq as pa_eq;

    #[test]
    fn ok_result_shape() {
        let result = Envelope::ok("getStatus", json!({"healthy": true})).into_call_result();
        pa_eq!(result["isError"], false);
        pa_eq!(result["content"][0]["type"], "text");
        let env = envelope_text(&result).unwrap();
        pa_eq!(env["data"]["healthy"], true);
        pa_eq!(env["meta"]["tool"], "getStatus");
        assert!(env.get("error").is_none());
    }

    #[test]
    fn error_result_shape() {
        let err = ToolError::not_found("tool", "nope").with_hint("call tools/list");
        let result = Envelope::err("nope", err).into_call_result();
        pa_eq!(result["isError"], true);
        let env = envelope_text(&result).unwrap();
        pa_eq!(env["data"], Value::Null);
        pa_eq!(env["error"]["code"], "RESOURCE_NOT_FOUND");
        pa_eq!(env["error"]["message"], "tool not found: nope");
        pa_eq!(env["error"]["hint"], "call tools/list");
        pa_eq!(env["error"]["retryable"], false);
    }

    #[test]
    fn meta_extras() {
        let env = Envelope::err("doctor", ToolError::new(ErrorCode::RateLimited, "x"))
            .with_duration_ms(12)
            .with_warning("slow");
        assert!(env.is_error());
        let v = serde_json::to_value(&env).unwrap();
        pa_eq!(v["meta"]["durationMs"], 12);
        pa_eq!(v["meta"]["warnings"][0], "slow");
    }
}
