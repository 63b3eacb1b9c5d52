//! JSON-RPC 2.0 envelope and message classification.
//!
//! A message is a request, a notification, or a response purely by which
//! fields are present; there is no separate tag.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// MCP extension for an unknown resource.
pub const RESOURCE_NOT_FOUND: i64 = -32002;

// ---------------------------------------------------------------------------
// RpcError
// ---------------------------------------------------------------------------

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::new(RESOURCE_NOT_FOUND, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One JSON-RPC frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub jsonrpc: String,
    /// `null` on the wire deserializes to `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// An explicit `"result": null` is `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// What an inbound frame is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    Invalid,
}

impl Message {
    /// Server-originated request.
    pub fn request(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(Value::from(id)),
            method: Some(method.into()),
            params,
            ..Default::default()
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: Some(method.into()),
            params,
            ..Default::default()
        }
    }

    /// Successful response to `id`.
    pub fn response(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(id),
            result: Some(result),
            ..Default::default()
        }
    }

    /// Error response. A missing id is written as `null`.
    pub fn error_response(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(id.unwrap_or(Value::Null)),
            error: Some(error),
            ..Default::default()
        }
    }

    fn has_method(&self) -> bool {
        self.method.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Classify by field presence.
    pub fn kind(&self) -> MessageKind {
        let has_method = self.has_method();
        let has_id = self.id.as_ref().is_some_and(|id| !id.is_null());
        let has_outcome = self.result.is_some() || self.error.is_some();
        match (has_method, has_id, has_outcome) {
            (true, true, false) => MessageKind::Request,
            (true, false, false) => MessageKind::Notification,
            (false, true, true) => MessageKind::Response,
            _ => MessageKind::Invalid,
        }
    }

    pub fn is_request(&self) -> bool {
        self.kind() == MessageKind::Request
    }

    pub fn is_notification(&self) -> bool {
        self.kind() == MessageKind::Notification
    }

    pub fn is_response(&self) -> bool {
        self.kind() == MessageKind::Response
    }

    /// The id as an integer, if it is an integral JSON number.
    pub fn numeric_id(&self) -> Option<i64> {
        match self.id.as_ref()? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }

    pub fn method_str(&self) -> &str {
        self.method.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// Why an inbound frame could not become a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Not JSON at all (or cut off).
    Parse { id: Option<Value>, detail: String },
    /// JSON, but not a JSON-RPC message shape.
    Shape { id: Option<Value>, detail: String },
    /// A malformed reply to one of our own requests. Never answered, since
    /// replying to a response could loop between the peers.
    Reply { id: Option<Value>, detail: String },
}

impl DecodeError {
    /// The error response to send, if there is anyone to address it to.
    ///
    /// Shape errors are always answered (with a `null` id if need be);
    /// parse errors only when an id could be salvaged from the raw text.
    pub fn into_response(self) -> Option<Message> {
        match self {
            DecodeError::Parse { id: Some(id), detail } => Some(Message::error_response(
                Some(id),
                RpcError::parse_error(format!("Failed to parse message: {detail}")),
            )),
            DecodeError::Parse { id: None, .. } => None,
            DecodeError::Shape { id, detail } => Some(Message::error_response(
                id,
                RpcError::invalid_request(format!("Invalid message: {detail}")),
            )),
            DecodeError::Reply { .. } => None,
        }
    }
}

/// Decode one frame.
pub fn decode_frame(frame: &[u8]) -> Result<Message, DecodeError> {
    let value: Value = serde_json::from_slice(frame).map_err(|e| DecodeError::Parse {
        id: salvage_id_from_text(&String::from_utf8_lossy(frame)),
        detail: e.to_string(),
    })?;
    let id = value.get("id").filter(|v| v.is_number() || v.is_string()).cloned();
    if !value.is_object() {
        return Err(DecodeError::Shape {
            id: None,
            detail: "expected a JSON object".into(),
        });
    }
    let is_reply = value.get("method").is_none()
        && (value.get("result").is_some() || value.get("error").is_some());
    serde_json::from_value(value).map_err(|e| {
        let detail = e.to_string();
        if is_reply {
            DecodeError::Reply { id, detail }
        } else {
            DecodeError::Shape { id, detail }
        }
    })
}

/// Best-effort recovery of a numeric or string `"id"` from a broken frame.
///
/// Only a key of the outermost object counts; an `"id"` nested in params
/// or inside a string is skipped.
pub fn salvage_id_from_text(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i)?;
                if depth == 1 && &text[i..=end] == "\"id\"" {
                    if let Some(rest) = text[end + 1..].trim_start().strip_prefix(':') {
                        let mut stream =
                            serde_json::Deserializer::from_str(rest.trim_start()).into_iter::<Value>();
                        return match stream.next()? {
                            Ok(v) if v.is_number() || v.is_string() => Some(v),
                            _ => None,
                        };
                    }
                }
                i = end;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the quote closing the string that opens at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use serde_json::json;
    use test_case::test_case;

    fn parse(s: &str) -> Message {
        serde_json::from_str(s).unwrap()
    }

    #[test_case(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#, MessageKind::Request ; "request")]
    #[test_case(r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#, MessageKind::Request ; "string id request")]
    #[test_case(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, MessageKind::Notification ; "notification")]
    #[test_case(r#"{"jsonrpc":"2.0","id":null,"method":"x"}"#, MessageKind::Notification ; "null id is notification")]
    #[test_case(r#"{"jsonrpc":"2.0","id":3,"result":{"roots":[]}}"#, MessageKind::Response ; "result response")]
    #[test_case(r#"{"jsonrpc":"2.0","id":3,"result":null}"#, MessageKind::Response ; "explicit null result")]
    #[test_case(r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"no"}}"#, MessageKind::Response ; "error response")]
    #[test_case(r#"{"jsonrpc":"2.0","id":3,"method":"x","result":1}"#, MessageKind::Invalid ; "method and result")]
    #[test_case(r#"{"jsonrpc":"2.0","id":3}"#, MessageKind::Invalid ; "id only")]
    #[test_case(r#"{"jsonrpc":"2.0","result":1}"#, MessageKind::Invalid ; "result without id")]
    #[test_case(r#"{"jsonrpc":"2.0","id":1,"method":""}"#, MessageKind::Invalid ; "empty method")]
    #[test_case(r#"{}"#, MessageKind::Invalid ; "empty object")]
    fn classify(raw: &str, expected: MessageKind) {
        pa_eq!(parse(raw).kind(), expected);
    }

    #[test]
    fn exactly_one_predicate_for_valid_kinds() {
        for raw in [
            r#"{"id":1,"method":"a"}"#,
            r#"{"method":"a"}"#,
            r#"{"id":1,"result":{}}"#,
        ] {
            let m = parse(raw);
            let count = [m.is_request(), m.is_notification(), m.is_response()]
                .iter()
                .filter(|b| **b)
                .count();
            pa_eq!(count, 1, "{raw}");
        }
    }

    #[test_case(json!(7), Some(7) ; "integer")]
    #[test_case(json!(7.0), Some(7) ; "integral float")]
    #[test_case(json!(7.5), None ; "fractional float")]
    #[test_case(json!("7"), None ; "string")]
    fn numeric_id(id: Value, expected: Option<i64>) {
        let m = Message {
            id: Some(id),
            ..Default::default()
        };
        pa_eq!(m.numeric_id(), expected);
    }

    #[test]
    fn request_serializes_without_result_fields() {
        let json = serde_json::to_value(Message::request(4, "roots/list", None)).unwrap();
        pa_eq!(json, json!({"jsonrpc": "2.0", "id": 4, "method": "roots/list"}));
    }

    #[test]
    fn error_response_without_id_uses_null() {
        let msg = Message::error_response(None, RpcError::invalid_request("bad"));
        let json = serde_json::to_value(msg).unwrap();
        pa_eq!(json["id"], Value::Null);
        pa_eq!(json["error"]["code"], -32600);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn null_result_survives_roundtrip() {
        let msg = Message::response(json!(1), Value::Null);
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("\"result\":null"));
        pa_eq!(parse(&text).kind(), MessageKind::Response);
    }

    #[test]
    fn decode_frame_ok() {
        let msg = decode_frame(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        pa_eq!(msg.method_str(), "ping");
    }

    #[test]
    fn decode_garbage_without_id_is_dropped() {
        let err = decode_frame(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::Parse { id: None, .. }));
        assert!(err.into_response().is_none());
    }

    #[test]
    fn decode_truncated_frame_salvages_id() {
        let err = decode_frame(br#"{"jsonrpc":"2.0","id":42,"method":"tools/li"#).unwrap_err();
        let resp = err.into_response().unwrap();
        pa_eq!(resp.id, Some(json!(42)));
        pa_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[test]
    fn decode_wrong_types_is_invalid_request_with_id() {
        let err = decode_frame(br#"{"jsonrpc":"2.0","id":9,"method":123}"#).unwrap_err();
        let resp = err.into_response().unwrap();
        pa_eq!(resp.id, Some(json!(9)));
        pa_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn decode_array_is_invalid_request() {
        let resp = decode_frame(b"[1,2,3]").unwrap_err().into_response().unwrap();
        pa_eq!(resp.id, Some(Value::Null));
        pa_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[test_case(r#"{"id": 5, "method": "x""#, Some(json!(5)) ; "spaced number")]
    #[test_case(r#"{"id":"req-1","method"#, Some(json!("req-1")) ; "string id")]
    #[test_case(r#"{"method":"x","id":{"#, None ; "object id")]
    #[test_case(r#"{"method":"x"#, None ; "no id")]
    #[test_case(
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"getSymbol","arguments":{"id":77}},"id":5"#,
        Some(json!(5)) ;
        "nested id ignored"
    )]
    #[test_case(r#"{"method":"say \"id\": 3","id":8,"#, Some(json!(8)) ; "id inside string ignored")]
    #[test_case(r#"{"params":{"id":3},"method":"x"#, None ; "only nested id")]
    fn salvage(text: &str, expected: Option<Value>) {
        pa_eq!(salvage_id_from_text(text), expected);
    }

    #[test]
    fn error_reply_without_message_is_response() {
        let msg = decode_frame(br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601}}"#).unwrap();
        pa_eq!(msg.kind(), MessageKind::Response);
        let err = msg.error.unwrap();
        pa_eq!(err.code, METHOD_NOT_FOUND);
        pa_eq!(err.message, "");
    }

    #[test_case(br#"{"jsonrpc":"2.0","id":1,"error":"denied"}"# ; "string error")]
    #[test_case(br#"{"jsonrpc":"2.0","id":1,"error":{"message":"no code"}}"# ; "error without code")]
    fn malformed_reply_is_never_answered(frame: &[u8]) {
        let err = decode_frame(frame).unwrap_err();
        assert!(matches!(err, DecodeError::Reply { .. }), "{err:?}");
        assert!(err.into_response().is_none());
    }

    #[test]
    fn method_not_found_message() {
        let err = RpcError::method_not_found("foo/bar");
        pa_eq!(err.code, METHOD_NOT_FOUND);
        pa_eq!(err.message, "Method not found: foo/bar");
    }
}
