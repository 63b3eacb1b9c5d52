//! MCP resources: two static documents and two URI templates.
//!
//! | URI | content |
//! |---|---|
//! | `ckb://status` | server, session and engine status |
//! | `ckb://architecture` | repository architecture overview |
//! | `ckb://module/{moduleId}` | one module's overview |
//! | `ckb://symbol/{symbolId}` | one symbol's details |

use serde::Serialize;
use serde_json::{json, Value};

use super::catalog::ToolId;
use super::protocol::RpcError;

pub const SCHEME: &str = "ckb://";
pub const MIME_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDef {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

pub fn resource_definitions() -> (Vec<ResourceDef>, Vec<ResourceTemplate>) {
    let resources = vec![
        ResourceDef {
            uri: "ckb://status",
            name: "Server status",
            description: "Session preset, loaded engines and backend health",
            mime_type: MIME_JSON,
        },
        ResourceDef {
            uri: "ckb://architecture",
            name: "Architecture overview",
            description: "Module structure and dependencies of the active repository",
            mime_type: MIME_JSON,
        },
    ];
    let templates = vec![
        ResourceTemplate {
            uri_template: "ckb://module/{moduleId}",
            name: "Module overview",
            description: "Responsibilities, exports and dependencies of one module",
            mime_type: MIME_JSON,
        },
        ResourceTemplate {
            uri_template: "ckb://symbol/{symbolId}",
            name: "Symbol details",
            description: "Signature, location and references of one symbol",
            mime_type: MIME_JSON,
        },
    ];
    (resources, templates)
}

/// `resources/list` result.
pub fn list_result() -> Value {
    let (resources, templates) = resource_definitions();
    json!({ "resources": resources, "resourceTemplates": templates })
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Status,
    Architecture,
    Module(String),
    Symbol(String),
}

impl ResourceRef {
    /// The engine tool that backs this resource and its arguments, if any.
    pub fn engine_call(&self) -> Option<(ToolId, Value)> {
        match self {
            ResourceRef::Status => None,
            ResourceRef::Architecture => Some((ToolId::GetArchitecture, json!({}))),
            ResourceRef::Module(id) => Some((ToolId::GetModuleOverview, json!({ "path": id }))),
            ResourceRef::Symbol(id) => Some((ToolId::GetSymbol, json!({ "symbolId": id }))),
        }
    }
}

/// Parse a `ckb://` URI.
pub fn parse_resource_uri(uri: &str) -> Result<ResourceRef, RpcError> {
    let Some(rest) = uri.strip_prefix(SCHEME) else {
        return Err(RpcError::invalid_params(format!("invalid URI scheme: {uri}")));
    };
    let (kind, id) = match rest.split_once('/') {
        Some((kind, id)) => (kind, id),
        None => (rest, ""),
    };
    match kind {
        "status" => Ok(ResourceRef::Status),
        "architecture" => Ok(ResourceRef::Architecture),
        "module" if id.is_empty() => Err(RpcError::invalid_params("module URI requires module ID")),
        "module" => Ok(ResourceRef::Module(id.to_string())),
        "symbol" if id.is_empty() => Err(RpcError::invalid_params("symbol URI requires symbol ID")),
        "symbol" => Ok(ResourceRef::Symbol(id.to_string())),
        other => Err(RpcError::resource_not_found(format!(
            "unknown resource type: {other}"
        ))),
    }
}

/// `resources/read` result for `uri` with `body` serialized as text.
pub fn read_result(uri: &str, body: &Value) -> Value {
    json!({
        "contents": [{
            "uri": uri,
            "mimeType": MIME_JSON,
            "text": body.to_string(),
        }]
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
