//! Structured logging and lightweight metrics.
//!
//! This module provides:
//! - [`init_logging`]: one-time `tracing` setup with `RUST_LOG` support,
//!   writing to stderr so stdout stays a clean protocol channel
//! - [`Metrics`]: per-tool call, error and latency counters

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "ckb_mcp=info";

/// Initialize structured logging.
///
/// Defaults to `ckb_mcp=info` when `RUST_LOG` is not set. Call once at
/// program startup; later calls are ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Counters for one tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStats {
    pub calls: u64,
    pub errors: u64,
    pub total_ms: u64,
}

impl ToolStats {
    pub fn avg_ms(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.total_ms as f64 / self.calls as f64
    }
}

/// Thread-safe per-tool metrics collector.
///
/// Serializable to JSON via [`Metrics::to_json`].
#[derive(Debug, Default)]
pub struct Metrics {
    tools: Mutex<BTreeMap<String, ToolStats>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call.
    pub fn record(&self, tool: &str, elapsed: Duration, is_error: bool) {
        let mut tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        let stats = tools.entry(tool.to_string()).or_default();
        stats.calls += 1;
        stats.total_ms += u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if is_error {
            stats.errors += 1;
        }
    }

    pub fn get(&self, tool: &str) -> Option<ToolStats> {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.get(tool).cloned()
    }

    pub fn total_calls(&self) -> u64 {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.values().map(|s| s.calls).sum()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        let per_tool: serde_json::Map<String, serde_json::Value> = tools
            .iter()
            .map(|(name, s)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "calls": s.calls,
                        "errors": s.errors,
                        "totalMs": s.total_ms,
                        "avgMs": s.avg_ms(),
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "totalCalls": tools.values().map(|s| s.calls).sum::<u64>(),
            "totalErrors": tools.values().map(|s| s.errors).sum::<u64>(),
            "tools": per_tool,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_does_not_panic() {
        init_logging();
        // Second call should also not panic (try_init ignores re-init).
        init_logging();
    }

    #[test]
    fn metrics_new_is_empty() {
        let m = Metrics::new();
        assert_eq!(m.total_calls(), 0);
        assert!(m.get("explore").is_none());
        assert_eq!(m.to_json()["totalCalls"], 0);
    }

    #[test]
    fn metrics_record_accumulates() {
        let m = Metrics::new();
        m.record("explore", Duration::from_millis(10), false);
        m.record("explore", Duration::from_millis(30), true);
        m.record("doctor", Duration::from_millis(5), false);

        let explore = m.get("explore").unwrap();
        assert_eq!(explore.calls, 2);
        assert_eq!(explore.errors, 1);
        assert_eq!(explore.total_ms, 40);
        assert!((explore.avg_ms() - 20.0).abs() < f64::EPSILON);
        assert_eq!(m.total_calls(), 3);
    }

    #[test]
    fn metrics_to_json_shape() {
        let m = Metrics::new();
        m.record("doctor", Duration::from_millis(4), true);
        let json = m.to_json();
        assert_eq!(json["totalErrors"], 1);
        assert_eq!(json["tools"]["doctor"]["calls"], 1);
        assert_eq!(json["tools"]["doctor"]["totalMs"], 4);
    }

    #[test]
    fn avg_of_no_calls_is_zero() {
        assert_eq!(ToolStats::default().avg_ms(), 0.0);
    }
}
