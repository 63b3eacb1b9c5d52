//! MCP server: JSON-RPC over newline-delimited stdio.
//!
//! - [`protocol`] and [`transport`]: message model, classification, framing
//! - [`server`]: the read loop and method dispatch
//! - [`pending`] and [`roots`]: server-initiated `roots/list` requests
//! - [`catalog`], [`presets`], [`pagination`]: the paged, preset-filtered tool list
//! - [`session`]: per-connection mutable state
//! - [`tools`], [`envelope`], [`resources`]: tool and resource handlers

pub mod catalog;
pub mod envelope;
pub mod pagination;
pub mod pending;
pub mod presets;
pub mod protocol;
pub mod resources;
pub mod roots;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

pub use server::McpServer;
