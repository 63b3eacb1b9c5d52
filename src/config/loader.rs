//! Multi-source configuration loading.
//!
//! Priority, lowest to highest:
//! 1. built-in defaults
//! 2. global `mcp.yaml` in the platform config directory
//! 3. project `<root>/.ckb/mcp.yaml`
//! 4. an explicit `--config` file
//! 5. `CKB_*` environment variables
//!
//! CLI flags are applied by the binary on top of the returned config.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde_yaml::{Mapping, Value};

use super::schema::{PresetName, ServerConfig};
use crate::error::{Result, ServerError};

/// Config file name, both globally and under `.ckb/` in a project.
pub const CONFIG_FILE_NAME: &str = "mcp.yaml";

/// Per-project directory holding the index and local config.
pub const PROJECT_DIR_NAME: &str = ".ckb";

/// Load configuration from every source for `project_root`.
pub fn load_config(explicit: Option<&Path>, project_root: Option<&Path>) -> Result<ServerConfig> {
    let mut files = Vec::new();
    if let Some(global) = global_config_path() {
        files.push(global);
    }
    if let Some(root) = project_root {
        files.push(project_config_path(root));
    }
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ServerError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        files.push(path.to_path_buf());
    }

    let mut config = merge_files(&files)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// `<config dir>/mcp.yaml` for this platform, if a home directory is known.
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "ckb", "ckb-mcp").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Merge YAML files in order; later files override earlier ones key by key.
/// Missing files are skipped.
pub fn merge_files(files: &[PathBuf]) -> Result<ServerConfig> {
    let mut merged = Mapping::new();
    for path in files {
        if !path.exists() {
            continue;
        }
        let contents = std::fs::read_to_string(path)?;
        let value: Value = serde_yaml::from_str(&contents).map_err(|e| {
            ServerError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        match value {
            Value::Mapping(map) => {
                for (k, v) in map {
                    merged.insert(k, v);
                }
            }
            Value::Null => {}
            _ => {
                return Err(ServerError::Config(format!(
                    "{} must contain a YAML mapping",
                    path.display()
                )))
            }
        }
        tracing::debug!(path = %path.display(), "loaded config layer");
    }
    let config = serde_yaml::from_value(Value::Mapping(merged))?;
    Ok(config)
}

/// Apply `CKB_*` overrides. Unparseable values are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("CKB_PRESET") {
        match PresetName::from_str_loose(&raw) {
            Some(preset) => config.preset = preset,
            None => tracing::warn!(value = %raw, "ignoring invalid CKB_PRESET"),
        }
    }
    if let Some(v) = parse_env(&lookup, "CKB_PAGE_SIZE") {
        config.page_size = v;
    }
    if let Some(v) = parse_env(&lookup, "CKB_MAX_ENGINES") {
        config.max_engines = v;
    }
    if let Some(v) = parse_env(&lookup, "CKB_ROOTS_TIMEOUT_MS") {
        config.roots_timeout_ms = v;
    }
    if let Some(raw) = lookup("CKB_REPOS_FILE") {
        if !raw.trim().is_empty() {
            config.repos_file = Some(PathBuf::from(raw));
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn no_files_gives_defaults() {
        let config = merge_files(&[]).unwrap();
        pa_eq!(config, ServerConfig::default());
    }

    #[test]
    fn missing_files_are_skipped() {
        let config = merge_files(&[PathBuf::from("/definitely/not/here.yaml")]).unwrap();
        pa_eq!(config, ServerConfig::default());
    }

    #[test]
    fn later_layers_override_earlier_keys() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.yaml", "preset: review\npage_size: 10\n");
        let b = write(&dir, "b.yaml", "page_size: 7\n");
        let config = merge_files(&[a, b]).unwrap();
        pa_eq!(config.preset, PresetName::Review);
        pa_eq!(config.page_size, 7);
    }

    #[test]
    fn empty_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.yaml", "");
        pa_eq!(merge_files(&[a]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn scalar_file_is_error() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.yaml", "just a string");
        assert!(matches!(merge_files(&[a]), Err(ServerError::Config(_))));
    }

    #[test]
    fn project_config_is_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(PROJECT_DIR_NAME)).unwrap();
        std::fs::write(project_config_path(dir.path()), "max_engines: 2\n").unwrap();
        let config = merge_files(&[project_config_path(dir.path())]).unwrap();
        pa_eq!(config.max_engines, 2);
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let result = load_config(Some(Path::new("/nope/mcp.yaml")), None);
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("CKB_PRESET", "ops"),
            ("CKB_PAGE_SIZE", "30"),
            ("CKB_MAX_ENGINES", "9"),
            ("CKB_ROOTS_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();
        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));
        pa_eq!(config.preset, PresetName::Ops);
        pa_eq!(config.page_size, 30);
        pa_eq!(config.max_engines, 9);
        pa_eq!(config.roots_timeout_ms, 250);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let env: HashMap<&str, &str> = [("CKB_PRESET", "bogus"), ("CKB_PAGE_SIZE", "-3")]
            .into_iter()
            .collect();
        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));
        pa_eq!(config, ServerConfig::default());
    }
}
