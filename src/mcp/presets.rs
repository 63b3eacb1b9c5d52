//! Preset filtering, canonical ordering, and toolset fingerprinting.
//!
//! `filter_and_order` decides what a session sees; `toolset_fingerprint`
//! detects when that view changed so stale pagination cursors are rejected.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::catalog::Tool;
use crate::config::preset::{get_preset, CANONICAL_ORDER};
use crate::config::PresetName;

/// Hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 10;

/// Select the tools of `preset` and order them canonical-first.
pub fn filter_and_order(tools: &[Tool], preset: PresetName) -> Vec<Tool> {
    let selection = get_preset(preset).tools;
    let filtered: Vec<Tool> = tools
        .iter()
        .filter(|t| selection.contains(&t.name))
        .cloned()
        .collect();
    order_canonical_first(filtered)
}

/// Canonical-priority tools first in their fixed order, then the rest by name.
pub fn order_canonical_first(tools: Vec<Tool>) -> Vec<Tool> {
    let mut by_name: HashMap<String, Tool> =
        tools.into_iter().map(|t| (t.name.clone(), t)).collect();

    let mut ordered = Vec::with_capacity(by_name.len());
    for id in CANONICAL_ORDER {
        if let Some(tool) = by_name.remove(id.name()) {
            ordered.push(tool);
        }
    }

    let mut rest: Vec<Tool> = by_name.into_values().collect();
    rest.sort_by(|a, b| a.name.cmp(&b.name));
    ordered.extend(rest);
    ordered
}

/// Content hash of a tool list, independent of its order.
///
/// Each tool contributes its name, description and compact schema JSON,
/// terminated by a zero byte.
pub fn toolset_fingerprint(tools: &[Tool]) -> String {
    let mut sorted: Vec<&Tool> = tools.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for tool in sorted {
        hasher.update(tool.name.as_bytes());
        hasher.update(tool.description.as_bytes());
        if let Ok(schema) = serde_json::to_vec(&tool.input_schema) {
            hasher.update(&schema);
        }
        hasher.update([0u8]);
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

// ---------------------------------------------------------------------------
// Preset summaries
// ---------------------------------------------------------------------------

/// Display information about a preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetInfo {
    pub name: PresetName,
    pub tool_count: usize,
    pub token_estimate: usize,
    pub description: &'static str,
    pub is_default: bool,
}

/// Rough token count of a JSON payload of `json_bytes` bytes.
pub fn estimate_tokens(json_bytes: usize) -> usize {
    json_bytes / 4
}

/// Estimated tokens a `tools/list` response listing `tools` costs.
pub fn estimate_tool_tokens(tools: &[Tool]) -> usize {
    estimate_tokens(serde_json::to_vec(tools).map(|v| v.len()).unwrap_or(0))
}

/// Tool count and token estimate for every preset over `tools`.
pub fn preset_infos(tools: &[Tool]) -> Vec<PresetInfo> {
    PresetName::ALL
        .iter()
        .map(|&name| {
            let filtered = filter_and_order(tools, name);
            PresetInfo {
                name,
                tool_count: filtered.len(),
                token_estimate: estimate_tool_tokens(&filtered),
                description: get_preset(name).description,
                is_default: name.is_default(),
            }
        })
        .collect()
}

/// Format a token count for display, e.g. `~12k tokens`.
pub fn format_tokens(tokens: usize) -> String {
    if tokens >= 1000 {
        format!("~{}k tokens", (tokens + 500) / 1000)
    } else {
        format!("~{tokens} tokens")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
