//! Repository registry for multi-repo mode.
//!
//! The registry is a small YAML file listing named repositories and an
//! optional default. Each repository keeps its own `.ckb/` index; the
//! registry only stores where to find it. A missing registry file loads as
//! an empty registry.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::loader::PROJECT_DIR_NAME;
use crate::error::{Result, ServerError};

/// Registry format version written by [`RepoRegistry::save`].
pub const REGISTRY_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A named repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoEntry {
    pub name: String,
    /// Absolute path, or relative to the registry file's directory.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

/// On-disk health of a registered repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoState {
    /// Directory exists and has been initialized.
    Valid,
    /// Directory exists but has no index directory.
    Uninitialized,
    /// Path does not exist or is not a directory.
    Missing,
}

impl RepoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Uninitialized => "uninitialized",
            Self::Missing => "missing",
        }
    }
}

/// Classify `path` by what is on disk.
pub fn validate_state(path: &Path) -> RepoState {
    if !path.is_dir() {
        return RepoState::Missing;
    }
    if !path.join(PROJECT_DIR_NAME).is_dir() {
        return RepoState::Uninitialized;
    }
    RepoState::Valid
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(default)]
    repos: Vec<RepoEntry>,
}

/// The loaded registry, remembering where it came from.
#[derive(Debug, Clone)]
pub struct RepoRegistry {
    file: PathBuf,
    repos: Vec<RepoEntry>,
    default: Option<String>,
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl RepoRegistry {
    /// An empty registry that will be saved to `file`.
    pub fn empty(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            repos: Vec::new(),
            default: None,
        }
    }

    /// Load the registry at `file`.
    pub fn load(file: &Path) -> Result<Self> {
        if !file.exists() {
            tracing::debug!(path = %file.display(), "no registry file, starting empty");
            return Ok(Self::empty(file));
        }
        let contents = std::fs::read_to_string(file)?;
        let parsed: RegistryFile = serde_yaml::from_str(&contents).map_err(|e| {
            ServerError::Registry(format!("failed to parse {}: {e}", file.display()))
        })?;
        if parsed.version > REGISTRY_VERSION {
            return Err(ServerError::Registry(format!(
                "registry version {} not supported (max: {REGISTRY_VERSION})",
                parsed.version
            )));
        }
        Ok(Self {
            file: file.to_path_buf(),
            repos: parsed.repos,
            default: parsed.default.filter(|d| !d.is_empty()),
        })
    }

    /// Write the registry back to its file, creating parent directories.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let out = RegistryFile {
            version: REGISTRY_VERSION,
            default: self.default.clone(),
            repos: self.repos.clone(),
        };
        let yaml = serde_yaml::to_string(&out)?;
        let tmp = self.file.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml)?;
        std::fs::rename(&tmp, &self.file)?;
        Ok(())
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Entries in registration order.
    pub fn list(&self) -> &[RepoEntry] {
        &self.repos
    }

    pub fn get(&self, name: &str) -> Option<&RepoEntry> {
        self.repos.iter().find(|r| r.name == name)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Absolute path of a registered repository.
    pub fn resolve(&self, entry: &RepoEntry) -> PathBuf {
        let base = self.file.parent().unwrap_or_else(|| Path::new("."));
        resolve_path(&entry.path, base)
    }

    /// Entry and current state for `name`.
    pub fn lookup(&self, name: &str) -> Option<(&RepoEntry, PathBuf, RepoState)> {
        let entry = self.get(name)?;
        let path = self.resolve(entry);
        let state = validate_state(&path);
        Some((entry, path, state))
    }

    /// Register a repository. The path must be an existing directory.
    pub fn add_repo(&mut self, name: &str, path: &Path) -> Result<()> {
        validate_name(name)?;
        if self.get(name).is_some() {
            return Err(ServerError::Registry(format!("repo '{name}' already exists")));
        }
        if !path.is_dir() {
            return Err(ServerError::Registry(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }
        let abs = path.canonicalize()?;
        self.repos.push(RepoEntry {
            name: name.to_string(),
            path: abs.display().to_string(),
            added_at: Some(Utc::now()),
        });
        Ok(())
    }

    /// Unregister a repository, clearing the default if it pointed here.
    pub fn remove_repo(&mut self, name: &str) -> Result<()> {
        let before = self.repos.len();
        self.repos.retain(|r| r.name != name);
        if self.repos.len() == before {
            return Err(ServerError::Registry(format!("repo '{name}' not found")));
        }
        if self.default.as_deref() == Some(name) {
            self.default = None;
        }
        Ok(())
    }

    pub fn set_default(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(n) = name {
            if self.get(n).is_none() {
                return Err(ServerError::Registry(format!("repo '{n}' not found")));
            }
        }
        self.default = name.map(str::to_string);
        Ok(())
    }
}

/// Repository names are non-empty ASCII letters, digits, `_` and `-`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ServerError::Registry("repo name cannot be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServerError::Registry(
            "repo name must contain only letters, numbers, underscores, and hyphens".into(),
        ));
    }
    Ok(())
}

fn resolve_path(path_str: &str, base: &Path) -> PathBuf {
    let p = Path::new(path_str);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use std::fs;
    use tempfile::TempDir;
    use test_case::test_case;

    fn registry_in(tmp: &TempDir) -> RepoRegistry {
        RepoRegistry::empty(tmp.path().join("repos.yaml"))
    }

    fn make_repo(tmp: &TempDir, name: &str, initialized: bool) -> PathBuf {
        let dir = tmp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        if initialized {
            fs::create_dir_all(dir.join(PROJECT_DIR_NAME)).unwrap();
        }
        dir
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let reg = RepoRegistry::load(&tmp.path().join("nope.yaml")).unwrap();
        assert!(reg.list().is_empty());
        assert!(reg.default_name().is_none());
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let api = make_repo(&tmp, "api", true);
        let mut reg = registry_in(&tmp);
        reg.add_repo("api", &api).unwrap();
        reg.set_default(Some("api")).unwrap();
        reg.save().unwrap();

        let loaded = RepoRegistry::load(reg.file()).unwrap();
        pa_eq!(loaded.list().len(), 1);
        pa_eq!(loaded.default_name(), Some("api"));
        pa_eq!(loaded.resolve(&loaded.list()[0]), api.canonicalize().unwrap());
    }

    #[test]
    fn relative_paths_resolve_against_registry_dir() {
        let tmp = TempDir::new().unwrap();
        make_repo(&tmp, "web", false);
        let file = tmp.path().join("repos.yaml");
        fs::write(&file, "version: 1\nrepos:\n  - name: web\n    path: ./web\n").unwrap();

        let reg = RepoRegistry::load(&file).unwrap();
        let (_, path, state) = reg.lookup("web").unwrap();
        pa_eq!(path, tmp.path().join("./web"));
        pa_eq!(state, RepoState::Uninitialized);
    }

    #[test]
    fn newer_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("repos.yaml");
        fs::write(&file, "version: 9\nrepos: []\n").unwrap();
        let err = RepoRegistry::load(&file).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("repos.yaml");
        fs::write(&file, "repos: [unterminated").unwrap();
        assert!(RepoRegistry::load(&file).is_err());
    }

    #[test]
    fn add_repo_rejects_duplicates() {
        let tmp = TempDir::new().unwrap();
        let api = make_repo(&tmp, "api", true);
        let mut reg = registry_in(&tmp);
        reg.add_repo("api", &api).unwrap();
        let err = reg.add_repo("api", &api).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn add_repo_rejects_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry_in(&tmp);
        assert!(reg.add_repo("ghost", &tmp.path().join("ghost")).is_err());
    }

    #[test]
    fn remove_repo_clears_default() {
        let tmp = TempDir::new().unwrap();
        let api = make_repo(&tmp, "api", true);
        let mut reg = registry_in(&tmp);
        reg.add_repo("api", &api).unwrap();
        reg.set_default(Some("api")).unwrap();
        reg.remove_repo("api").unwrap();
        assert!(reg.default_name().is_none());
        assert!(reg.remove_repo("api").is_err());
    }

    #[test]
    fn set_default_requires_known_repo() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry_in(&tmp);
        assert!(reg.set_default(Some("ghost")).is_err());
        assert!(reg.set_default(None).is_ok());
    }

    #[test]
    fn states() {
        let tmp = TempDir::new().unwrap();
        pa_eq!(validate_state(&make_repo(&tmp, "a", true)), RepoState::Valid);
        pa_eq!(validate_state(&make_repo(&tmp, "b", false)), RepoState::Uninitialized);
        pa_eq!(validate_state(&tmp.path().join("c")), RepoState::Missing);

        let file = tmp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        pa_eq!(validate_state(&file), RepoState::Missing);
    }

    #[test_case("api" ; "simple")]
    #[test_case("my-repo_2" ; "dash underscore digit")]
    fn valid_names(name: &str) {
        assert!(validate_name(name).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("has space" ; "space")]
    #[test_case("../up" ; "path chars")]
    fn invalid_names(name: &str) {
        assert!(validate_name(name).is_err());
    }
}
