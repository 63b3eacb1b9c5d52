//! Configuration: YAML schema, preset definitions, and multi-source loading.

pub mod loader;
pub mod preset;
pub mod schema;

pub use schema::{PresetName, ServerConfig};
