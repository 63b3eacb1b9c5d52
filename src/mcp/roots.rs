//! Client filesystem roots.
//!
//! Roots arrive in the client's reply to a server-initiated `roots/list`
//! and replace the previous set wholesale. Only local, absolute `file://`
//! URIs without `..` segments are accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// A client-declared filesystem boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Capabilities the client advertised in `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientCapabilities {
    #[serde(default)]
    pub roots: Option<RootsCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

/// Read `params.capabilities` from an `initialize` request.
///
/// Anything malformed is treated as "no capabilities".
pub fn parse_client_capabilities(params: Option<&Value>) -> ClientCapabilities {
    params
        .and_then(|p| p.get("capabilities"))
        .and_then(|caps| match caps.get("roots") {
            Some(Value::Object(_)) => serde_json::from_value(caps.clone()).ok(),
            _ => None,
        })
        .unwrap_or_default()
}

/// Whether `uri` is a root we accept.
pub fn is_valid_root_uri(uri: &str) -> bool {
    if !uri.starts_with("file://") || uri.contains("..") {
        return false;
    }
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    if url.host_str().is_some_and(|h| !h.is_empty()) {
        return false;
    }
    url.to_file_path().is_ok_and(|p| p.is_absolute())
}

/// Extract roots from a `roots/list` result.
///
/// Returns `None` when the result does not have a `roots` array. Entries
/// that are not objects or carry an invalid URI are skipped.
pub fn parse_roots_response(result: &Value) -> Option<Vec<Root>> {
    let entries = result.get("roots")?.as_array()?;
    let roots = entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let uri = obj.get("uri").and_then(Value::as_str).unwrap_or_default();
            let name = obj.get("name").and_then(Value::as_str).unwrap_or_default();
            if uri.is_empty() || !is_valid_root_uri(uri) {
                tracing::debug!(uri, "skipping invalid root");
                return None;
            }
            Some(Root {
                uri: uri.to_string(),
                name: name.to_string(),
            })
        })
        .collect();
    Some(roots)
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

    #[test_case("file:///home/user/project", true ; "absolute local")]
    #[test_case("file:///tmp", true ; "short absolute")]
    #[test_case("file://localhost/tmp", true ; "localhost host normalises to empty")]
    #[test_case("file://server/share", false ; "remote host")]
    #[test_case("file:///home/../etc", false ; "dotdot")]
    #[test_case("http://example.com/x", false ; "wrong scheme")]
    #[test_case("/home/user", false ; "bare path")]
    #[test_case("", false ; "empty")]
    fn root_uri_validation(uri: &str, expected: bool) {
        pa_eq!(is_valid_root_uri(uri), expected);
    }

    #[test]
    fn capabilities_with_roots() {
        let params = json!({"capabilities": {"roots": {"listChanged": true}}});
        let caps = parse_client_capabilities(Some(&params));
        pa_eq!(caps.roots, Some(RootsCapability { list_changed: true }));
    }

    #[test]
    fn capabilities_roots_without_list_changed() {
        let params = json!({"capabilities": {"roots": {}}});
        let caps = parse_client_capabilities(Some(&params));
        pa_eq!(caps.roots, Some(RootsCapability { list_changed: false }));
    }

    #[test_case(None ; "no params")]
    #[test_case(Some(json!({})) ; "no capabilities")]
    #[test_case(Some(json!({"capabilities": "nope"})) ; "capabilities not object")]
    #[test_case(Some(json!({"capabilities": {"roots": true}})) ; "roots not object")]
    #[test_case(Some(json!({"capabilities": {"sampling": {}}})) ; "other capability")]
    fn capabilities_without_roots(params: Option<Value>) {
        pa_eq!(parse_client_capabilities(params.as_ref()).roots, None);
    }

    #[test]
    fn parse_roots_filters_invalid() {
        let result = json!({"roots": [
            {"uri": "file:///a", "name": "A"},
            {"uri": "file://host/b"},
            {"uri": "file:///c/../d"},
            "not an object",
            {"name": "no uri"},
            {"uri": "file:///e"}
        ]});
        let roots = parse_roots_response(&result).unwrap();
        pa_eq!(
            roots,
            vec![
                Root { uri: "file:///a".into(), name: "A".into() },
                Root { uri: "file:///e".into(), name: String::new() },
            ]
        );
    }

    #[test]
    fn parse_roots_empty_list_is_some() {
        pa_eq!(parse_roots_response(&json!({"roots": []})), Some(vec![]));
    }

    #[test_case(json!(null) ; "null")]
    #[test_case(json!({}) ; "missing roots")]
    #[test_case(json!({"roots": "x"}) ; "roots not array")]
    fn parse_roots_malformed(result: Value) {
        pa_eq!(parse_roots_response(&result), None);
    }
}
