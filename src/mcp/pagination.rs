//! Stateless cursor pagination for `tools/list`.
//!
//! A cursor is URL-safe, unpadded base64 over compact JSON
//! `{"v":version,"p":preset,"o":offset,"h":fingerprint}`. It is only valid
//! against the exact preset and toolset fingerprint it was minted under.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PresetName;

pub use crate::config::schema::DEFAULT_PAGE_SIZE;

/// Bumped whenever the cursor payload changes shape.
pub const CURSOR_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    #[serde(rename = "v")]
    version: u32,
    #[serde(rename = "p")]
    preset: String,
    #[serde(rename = "o")]
    offset: i64,
    #[serde(rename = "h")]
    fingerprint: String,
}

/// Why a cursor was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid cursor encoding")]
    Encoding,
    #[error("invalid cursor format")]
    Format,
    #[error("cursor version mismatch (got {got}, expected {CURSOR_VERSION})")]
    Version { got: u32 },
    #[error("preset changed")]
    PresetChanged,
    #[error("toolset changed")]
    ToolsetChanged,
    #[error("negative cursor offset")]
    NegativeOffset,
}

/// Mint a cursor for `offset` under `preset` / `fingerprint`.
pub fn encode_cursor(preset: PresetName, offset: usize, fingerprint: &str) -> String {
    let payload = CursorPayload {
        version: CURSOR_VERSION,
        preset: preset.as_str().to_string(),
        offset: i64::try_from(offset).unwrap_or(i64::MAX),
        fingerprint: fingerprint.to_string(),
    };
    serde_json::to_vec(&payload)
        .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
        .unwrap_or_default()
}

/// Decode and validate a cursor. The empty string is the first page.
pub fn decode_cursor(
    cursor: &str,
    preset: PresetName,
    fingerprint: &str,
) -> Result<usize, CursorError> {
    if cursor.is_empty() {
        return Ok(0);
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| CursorError::Encoding)?;
    let payload: CursorPayload = serde_json::from_slice(&bytes).map_err(|_| CursorError::Format)?;

    if payload.version != CURSOR_VERSION {
        return Err(CursorError::Version {
            got: payload.version,
        });
    }
    if payload.preset != preset.as_str() {
        return Err(CursorError::PresetChanged);
    }
    if payload.fingerprint != fingerprint {
        return Err(CursorError::ToolsetChanged);
    }
    usize::try_from(payload.offset).map_err(|_| CursorError::NegativeOffset)
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Slice `items` starting at `offset`.
///
/// A negative offset is treated as zero; a non-positive page size falls back
/// to [`DEFAULT_PAGE_SIZE`]. A next cursor is minted only when more items
/// remain after this page.
pub fn paginate<T: Clone>(
    items: &[T],
    offset: i64,
    page_size: i64,
    preset: PresetName,
    fingerprint: &str,
) -> Page<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let page_size = usize::try_from(page_size)
        .ok()
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    if offset >= items.len() {
        return Page {
            items: Vec::new(),
            next_cursor: None,
        };
    }

    let end = offset.saturating_add(page_size).min(items.len());
    let next_cursor = (end < items.len()).then(|| encode_cursor(preset, end, fingerprint));
    Page {
        items: items[offset..end].to_vec(),
        next_cursor,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
