//! ckb-mcp: MCP protocol and session engine for the CKB code-intelligence
//! backend.
//!
//! Serves a preset-filtered, paginated tool catalog over stdio JSON-RPC and
//! routes tool calls to per-repository query engines held in a bounded pool.

pub mod config;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod observability;
pub mod workspace;
