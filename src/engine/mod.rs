//! Backend query engines.
//!
//! A [`QueryEngine`] is a handle bound to one repository's index through
//! which tool calls run. Engines are opened by an [`EngineOpener`] and handed
//! out by an [`EngineProvider`]: either the single configured engine
//! ([`SingleEngine`]) or a bounded LRU pool keyed by repository path
//! ([`EnginePool`]).

pub mod pool;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::config::loader::PROJECT_DIR_NAME;
use crate::error::ToolError;
use crate::mcp::catalog::ToolId;

pub use pool::{EngineLease, EnginePool, EntryInfo, PoolError, SingleEngine};

/// One repository's query backend.
pub trait QueryEngine: Send + Sync {
    fn repo_root(&self) -> &Path;

    /// Run an analysis tool. Blocking; callers run it off the async executor.
    fn execute(&self, tool: ToolId, args: &Map<String, Value>) -> Result<Value, ToolError>;

    /// Backend health summary for `getStatus` and `ckb://status`.
    fn status(&self) -> Value;

    /// Release backend resources. Called once, by the provider, when idle.
    fn close(&self);
}

/// Opens engines for repository paths.
pub trait EngineOpener: Send + Sync {
    fn open(&self, repo: &Path) -> Result<Arc<dyn QueryEngine>, ToolError>;
}

/// Hands out engine leases. Chosen once at server construction.
pub trait EngineProvider: Send + Sync {
    /// Borrow the engine for `repo`, opening it if needed.
    fn acquire(&self, repo: &Path, name: &str) -> Result<EngineLease, PoolError>;

    /// Borrow the engine for `repo` only if it is already open. Never opens
    /// and never counts as a use for eviction order.
    fn peek(&self, repo: &Path) -> Option<EngineLease>;

    /// Whether engines are keyed by repository (pool) or fixed (single).
    fn is_multi_repo(&self) -> bool;

    /// Currently open engines.
    fn entries(&self) -> Vec<EntryInfo>;

    fn is_loaded(&self, repo: &Path) -> bool {
        let key = normalize_repo_path(repo);
        self.entries().iter().any(|e| e.repo_path == key)
    }

    /// Close every idle engine (shutdown).
    fn close_all(&self);
}

/// Canonical form of a repository path used as the pool key.
pub fn normalize_repo_path(repo: &Path) -> PathBuf {
    repo.canonicalize().unwrap_or_else(|_| repo.to_path_buf())
}

// ---------------------------------------------------------------------------
// LocalRepoEngine: default backend
// ---------------------------------------------------------------------------

/// Engine over a local checkout without an attached analysis service.
///
/// It validates the repository and answers `doctor`; every analysis tool
/// reports `BACKEND_UNAVAILABLE`.
pub struct LocalRepoEngine {
    root: PathBuf,
    opened_at: DateTime<Utc>,
}

impl LocalRepoEngine {
    pub fn open(root: &Path) -> Result<Self, ToolError> {
        if !root.is_dir() {
            return Err(ToolError::not_found("repository", &root.display().to_string()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            opened_at: Utc::now(),
        })
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR_NAME)
    }

    fn doctor(&self) -> Value {
        let indexed = self.index_dir().is_dir();
        let mut checks = vec![json!({
            "name": "repository",
            "status": "pass",
            "message": format!("{} is readable", self.root.display()),
        })];
        checks.push(if indexed {
            json!({ "name": "index", "status": "pass", "message": "index directory present" })
        } else {
            json!({
                "name": "index",
                "status": "fail",
                "message": format!("no {PROJECT_DIR_NAME} directory"),
                "fix": "ckb init && ckb index",
            })
        });
        checks.push(json!({
            "name": "analysisBackend",
            "status": "warn",
            "message": "no analysis backend attached; analysis tools are unavailable",
        }));
        json!({ "healthy": indexed, "checks": checks })
    }
}

impl QueryEngine for LocalRepoEngine {
    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn execute(&self, tool: ToolId, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        match tool {
            ToolId::Doctor => Ok(self.doctor()),
            other => Err(ToolError::backend_unavailable(format!(
                "{other} requires the analysis backend, which is not attached to this server"
            ))
            .with_hint("start the CKB daemon or run the server from a CKB installation")),
        }
    }

    fn status(&self) -> Value {
        json!({
            "backend": "local",
            "repoRoot": self.root.display().to_string(),
            "indexed": self.index_dir().is_dir(),
            "openedAt": self.opened_at.to_rfc3339(),
        })
    }

    fn close(&self) {
        tracing::debug!(repo = %self.root.display(), "closing local engine");
    }
}

/// Opens [`LocalRepoEngine`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOpener;

impl EngineOpener for LocalOpener {
    fn open(&self, repo: &Path) -> Result<Arc<dyn QueryEngine>, ToolError> {
        Ok(Arc::new(LocalRepoEngine::open(repo)?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
