//! Configuration data structures for ckb-mcp.
//!
//! Defines the YAML config format: initial preset, pagination, engine pool
//! capacity, roots exchange timeout, frame limit, and the repository
//! registry location. Designed for multi-source loading with serde.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tools per `tools/list` page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Maximum number of engines the multi-repo pool keeps open.
pub const DEFAULT_MAX_ENGINES: usize = 5;

/// Deadline for the client to answer a server-initiated `roots/list`.
pub const DEFAULT_ROOTS_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on a single inbound frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the MCP server.
///
/// Loaded from YAML files, environment variables, and CLI flags.
/// Multiple sources are merged with well-defined priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Preset active when a session starts.
    #[serde(default = "default_preset")]
    pub preset: PresetName,

    /// Tools per `tools/list` page. Zero falls back to the default.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Engine pool capacity in multi-repo mode.
    #[serde(default = "default_max_engines")]
    pub max_engines: usize,

    /// Timeout for the server-initiated `roots/list` request, in milliseconds.
    #[serde(default = "default_roots_timeout_ms")]
    pub roots_timeout_ms: u64,

    /// Frames longer than this are rejected as parse errors.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Repository registry file. When set, the server runs in multi-repo mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            preset: default_preset(),
            page_size: default_page_size(),
            max_engines: default_max_engines(),
            roots_timeout_ms: default_roots_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            repos_file: None,
        }
    }
}

impl ServerConfig {
    pub fn effective_page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    pub fn effective_max_engines(&self) -> usize {
        self.max_engines.max(1)
    }

    pub fn roots_timeout(&self) -> Duration {
        Duration::from_millis(self.roots_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// PresetName
// ---------------------------------------------------------------------------

/// Named presets that control which tools a session exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    /// Investigate and assess impact (19 tools). The default.
    Core,
    /// Core plus diff/PR summaries and ownership.
    Review,
    /// Core plus coupling, dead code, and API comparison.
    Refactor,
    /// Core plus cross-repository federation queries.
    Federation,
    /// Core plus documentation-symbol linking.
    Docs,
    /// Core plus diagnostics, daemon, jobs, and webhooks.
    Ops,
    /// Every tool in the catalog.
    Full,
}

impl PresetName {
    /// Every preset, default first.
    pub const ALL: [PresetName; 7] = [
        Self::Core,
        Self::Review,
        Self::Refactor,
        Self::Federation,
        Self::Docs,
        Self::Ops,
        Self::Full,
    ];

    /// Parse from a loose string (case-insensitive, surrounding whitespace ignored).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "core" => Some(Self::Core),
            "review" => Some(Self::Review),
            "refactor" => Some(Self::Refactor),
            "federation" => Some(Self::Federation),
            "docs" => Some(Self::Docs),
            "ops" => Some(Self::Ops),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    /// Canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Review => "review",
            Self::Refactor => "refactor",
            Self::Federation => "federation",
            Self::Docs => "docs",
            Self::Ops => "ops",
            Self::Full => "full",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == default_preset()
    }

    /// Comma-separated list of valid names, for error messages.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for PresetName {
    fn default() -> Self {
        default_preset()
    }
}

impl std::fmt::Display for PresetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_preset() -> PresetName {
    PresetName::Core
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_engines() -> usize {
    DEFAULT_MAX_ENGINES
}

fn default_roots_timeout_ms() -> u64 {
    DEFAULT_ROOTS_TIMEOUT_MS
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        pa_eq!(config.version, "1.0");
        pa_eq!(config.preset, PresetName::Core);
        pa_eq!(config.page_size, 15);
        pa_eq!(config.max_engines, 5);
        pa_eq!(config.roots_timeout(), Duration::from_secs(10));
        pa_eq!(config.max_frame_bytes, 1_048_576);
        assert!(config.repos_file.is_none());
    }

    #[test_case("core", Some(PresetName::Core) ; "core lowercase")]
    #[test_case("CORE", Some(PresetName::Core) ; "core uppercase")]
    #[test_case("Review", Some(PresetName::Review) ; "review mixed")]
    #[test_case("refactor", Some(PresetName::Refactor) ; "refactor")]
    #[test_case("federation", Some(PresetName::Federation) ; "federation")]
    #[test_case("docs", Some(PresetName::Docs) ; "docs")]
    #[test_case("  ops  ", Some(PresetName::Ops) ; "ops whitespace padded")]
    #[test_case("full", Some(PresetName::Full) ; "full")]
    #[test_case("", None ; "empty string")]
    #[test_case("minimal", None ; "unknown preset")]
    #[test_case("*", None ; "wildcard is not a name")]
    fn preset_from_str_loose(input: &str, expected: Option<PresetName>) {
        pa_eq!(PresetName::from_str_loose(input), expected);
    }

    #[test]
    fn preset_display_matches_as_str() {
        for p in PresetName::ALL {
            pa_eq!(format!("{}", p), p.as_str());
            pa_eq!(PresetName::from_str_loose(p.as_str()), Some(p));
        }
    }

    #[test]
    fn only_core_is_default() {
        let defaults: Vec<_> = PresetName::ALL.iter().filter(|p| p.is_default()).collect();
        pa_eq!(defaults, vec![&PresetName::Core]);
    }

    #[test]
    fn valid_names_lists_all() {
        pa_eq!(
            PresetName::valid_names(),
            "core, review, refactor, federation, docs, ops, full"
        );
    }

    #[test]
    fn config_empty_yaml_uses_defaults() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        pa_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_full_yaml_config() {
        let yaml = r#"
version: "1.0"
preset: review
page_size: 10
max_engines: 3
roots_timeout_ms: 2500
max_frame_bytes: 4096
repos_file: /tmp/repos.yaml
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        pa_eq!(config.preset, PresetName::Review);
        pa_eq!(config.page_size, 10);
        pa_eq!(config.max_engines, 3);
        pa_eq!(config.roots_timeout(), Duration::from_millis(2500));
        pa_eq!(config.max_frame_bytes, 4096);
        pa_eq!(config.repos_file, Some(PathBuf::from("/tmp/repos.yaml")));
    }

    #[test]
    fn zero_page_size_falls_back() {
        let config = ServerConfig {
            page_size: 0,
            max_engines: 0,
            ..Default::default()
        };
        pa_eq!(config.effective_page_size(), DEFAULT_PAGE_SIZE);
        pa_eq!(config.effective_max_engines(), 1);
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let result: std::result::Result<ServerConfig, _> = serde_yaml::from_str("{{invalid yaml}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_preset_yaml_is_error() {
        let result: std::result::Result<ServerConfig, _> = serde_yaml::from_str("preset: minimal");
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn config_yaml_roundtrip_proptest(preset_idx in 0usize..7, page in 1usize..100) {
            let config = ServerConfig {
                preset: PresetName::ALL[preset_idx],
                page_size: page,
                ..Default::default()
            };
            let yaml = serde_yaml::to_string(&config).unwrap();
            let back: ServerConfig = serde_yaml::from_str(&yaml).unwrap();
            pa_eq!(config, back);
        }

        #[test]
        fn preset_from_str_loose_never_panics(s in "\\PC{0,50}") {
            let _ = PresetName::from_str_loose(&s);
        }
    }
}
