//! Engine leasing: a bounded LRU pool for multi-repo mode and a fixed
//! single engine for legacy mode.
//!
//! Every borrow is an [`EngineLease`]; dropping it decrements the entry's
//! in-flight count, on every exit path. The pool only closes an engine whose
//! count is zero. When a new repository needs a slot and every open engine
//! is busy, the request is denied with a retryable [`PoolError::Exhausted`]
//! rather than waiting or closing a busy handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::{normalize_repo_path, EngineOpener, EngineProvider, QueryEngine};
use crate::error::ToolError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    /// All slots hold engines with in-flight operations.
    #[error("engine pool exhausted: all {capacity} engines are busy, retry shortly")]
    Exhausted { capacity: usize },

    /// The backend refused to open the repository.
    #[error(transparent)]
    Open(#[from] ToolError),
}

impl PoolError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Exhausted { .. })
    }
}

/// Public view of one open engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub repo_path: PathBuf,
    pub repo_name: String,
    pub loaded_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub active_ops: usize,
}

// ---------------------------------------------------------------------------
// EngineLease
// ---------------------------------------------------------------------------

/// A borrowed engine. Dropping it returns the borrow to its provider.
pub struct EngineLease {
    engine: Arc<dyn QueryEngine>,
    release: Option<Release>,
}

/// Where a lease reports its return.
enum Release {
    Pool(Arc<Mutex<PoolState>>, PathBuf),
    Counter(Arc<AtomicUsize>),
}

impl EngineLease {
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }
}

impl std::ops::Deref for EngineLease {
    type Target = dyn QueryEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        match self.release.take() {
            Some(Release::Pool(state, key)) => {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                state.release(&key);
            }
            Some(Release::Counter(in_flight)) => {
                in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            None => {}
        }
    }
}

// ---------------------------------------------------------------------------
// PoolState: pure bookkeeping, no I/O
// ---------------------------------------------------------------------------

struct Entry {
    engine: Arc<dyn QueryEngine>,
    name: String,
    loaded_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    /// Logical clock of the last access, for LRU ordering.
    last_tick: u64,
    active_ops: usize,
}

pub(crate) struct PoolState {
    capacity: usize,
    entries: HashMap<PathBuf, Entry>,
    /// Slots reserved by opens in progress.
    reserved: usize,
    tick: u64,
}

impl PoolState {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            reserved: 0,
            tick: 0,
        }
    }

    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Borrow an already-open engine.
    fn checkout(&mut self, key: &Path) -> Option<Arc<dyn QueryEngine>> {
        let tick = self.touch();
        let entry = self.entries.get_mut(key)?;
        entry.last_tick = tick;
        entry.last_used = Utc::now();
        entry.active_ops += 1;
        Some(entry.engine.clone())
    }

    /// Borrow an already-open engine without changing its LRU position.
    fn peek(&mut self, key: &Path) -> Option<Arc<dyn QueryEngine>> {
        let entry = self.entries.get_mut(key)?;
        entry.active_ops += 1;
        Some(entry.engine.clone())
    }

    /// Reserve a slot, evicting idle least-recently-used entries as needed.
    /// Returns the evicted engines; the caller closes them outside the lock.
    fn reserve(&mut self) -> Result<Vec<(PathBuf, Arc<dyn QueryEngine>)>, PoolError> {
        let needed = (self.entries.len() + self.reserved + 1).saturating_sub(self.capacity);
        let mut idle: Vec<(&PathBuf, u64)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.active_ops == 0)
            .map(|(k, e)| (k, e.last_tick))
            .collect();
        if idle.len() < needed {
            return Err(PoolError::Exhausted {
                capacity: self.capacity,
            });
        }
        idle.sort_by_key(|(_, tick)| *tick);
        let victims: Vec<PathBuf> = idle.into_iter().take(needed).map(|(k, _)| k.clone()).collect();

        let evicted = victims
            .into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|e| (k, e.engine)))
            .collect();
        self.reserved += 1;
        Ok(evicted)
    }

    fn unreserve(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// Install a freshly opened engine and borrow it.
    ///
    /// If another open of the same path won the race, the existing entry is
    /// borrowed and `engine` is returned in the second slot for closing.
    fn install(
        &mut self,
        key: PathBuf,
        name: &str,
        engine: Arc<dyn QueryEngine>,
    ) -> (Arc<dyn QueryEngine>, Option<Arc<dyn QueryEngine>>) {
        self.unreserve();
        if let Some(existing) = self.checkout(&key) {
            return (existing, Some(engine));
        }
        let tick = self.touch();
        let now = Utc::now();
        self.entries.insert(
            key,
            Entry {
                engine: engine.clone(),
                name: name.to_string(),
                loaded_at: now,
                last_used: now,
                last_tick: tick,
                active_ops: 1,
            },
        );
        (engine, None)
    }

    fn release(&mut self, key: &Path) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.active_ops = entry.active_ops.saturating_sub(1);
        }
    }

    fn infos(&self) -> Vec<EntryInfo> {
        let mut infos: Vec<EntryInfo> = self
            .entries
            .iter()
            .map(|(path, e)| EntryInfo {
                repo_path: path.clone(),
                repo_name: e.name.clone(),
                loaded_at: e.loaded_at,
                last_used: e.last_used,
                active_ops: e.active_ops,
            })
            .collect();
        infos.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));
        infos
    }

    /// Remove every idle entry.
    fn drain_idle(&mut self) -> Vec<(PathBuf, Arc<dyn QueryEngine>)> {
        let idle: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|(_, e)| e.active_ops == 0)
            .map(|(k, _)| k.clone())
            .collect();
        idle.into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|e| (k, e.engine)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// EnginePool
// ---------------------------------------------------------------------------

/// Bounded cache of engines keyed by normalized repository path.
pub struct EnginePool {
    opener: Arc<dyn EngineOpener>,
    state: Arc<Mutex<PoolState>>,
}

impl EnginePool {
    pub fn new(opener: Arc<dyn EngineOpener>, capacity: usize) -> Self {
        Self {
            opener,
            state: Arc::new(Mutex::new(PoolState::new(capacity))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lease(&self, engine: Arc<dyn QueryEngine>, key: PathBuf) -> EngineLease {
        EngineLease {
            engine,
            release: Some(Release::Pool(self.state.clone(), key)),
        }
    }
}

fn close_evicted(evicted: Vec<(PathBuf, Arc<dyn QueryEngine>)>) {
    for (path, engine) in evicted {
        tracing::info!(repo = %path.display(), "evicting idle engine");
        engine.close();
    }
}

impl EngineProvider for EnginePool {
    fn acquire(&self, repo: &Path, name: &str) -> Result<EngineLease, PoolError> {
        let key = normalize_repo_path(repo);

        let evicted = {
            let mut state = self.lock();
            if let Some(engine) = state.checkout(&key) {
                return Ok(self.lease(engine, key));
            }
            state.reserve()?
        };
        close_evicted(evicted);

        // Open outside the lock; it may be slow.
        let opened = self.opener.open(&key);

        let (engine, duplicate) = {
            let mut state = self.lock();
            match opened {
                Ok(engine) => state.install(key.clone(), name, engine),
                Err(e) => {
                    state.unreserve();
                    return Err(PoolError::Open(e));
                }
            }
        };
        if let Some(dup) = duplicate {
            dup.close();
        } else {
            tracing::info!(repo = %key.display(), name, "opened engine");
        }
        Ok(self.lease(engine, key))
    }

    fn peek(&self, repo: &Path) -> Option<EngineLease> {
        let key = normalize_repo_path(repo);
        let engine = self.lock().peek(&key)?;
        Some(self.lease(engine, key))
    }

    fn is_multi_repo(&self) -> bool {
        true
    }

    fn entries(&self) -> Vec<EntryInfo> {
        self.lock().infos()
    }

    fn close_all(&self) {
        let drained = self.lock().drain_idle();
        for (path, engine) in drained {
            tracing::debug!(repo = %path.display(), "closing engine");
            engine.close();
        }
    }
}

// ---------------------------------------------------------------------------
// SingleEngine
// ---------------------------------------------------------------------------

/// Legacy mode: one engine, returned for every path.
pub struct SingleEngine {
    engine: Arc<dyn QueryEngine>,
    name: String,
    loaded_at: DateTime<Utc>,
    in_flight: Arc<AtomicUsize>,
}

impl SingleEngine {
    pub fn new(engine: Arc<dyn QueryEngine>, name: impl Into<String>) -> Self {
        Self {
            engine,
            name: name.into(),
            loaded_at: Utc::now(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn repo_root(&self) -> &Path {
        self.engine.repo_root()
    }

    fn lease(&self) -> EngineLease {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        EngineLease {
            engine: self.engine.clone(),
            release: Some(Release::Counter(self.in_flight.clone())),
        }
    }
}

impl EngineProvider for SingleEngine {
    fn acquire(&self, _repo: &Path, _name: &str) -> Result<EngineLease, PoolError> {
        Ok(self.lease())
    }

    fn peek(&self, _repo: &Path) -> Option<EngineLease> {
        Some(self.lease())
    }

    fn is_multi_repo(&self) -> bool {
        false
    }

    fn entries(&self) -> Vec<EntryInfo> {
        vec![EntryInfo {
            repo_path: self.engine.repo_root().to_path_buf(),
            repo_name: self.name.clone(),
            loaded_at: self.loaded_at,
            last_used: self.loaded_at,
            active_ops: self.in_flight.load(Ordering::Acquire),
        }]
    }

    fn is_loaded(&self, _repo: &Path) -> bool {
        true
    }

    /// Closes the engine unless a lease is still out; a busy engine is
    /// left to its in-flight call and released with the process.
    fn close_all(&self) {
        let busy = self.in_flight.load(Ordering::Acquire);
        if busy > 0 {
            tracing::warn!(active_ops = busy, "engine busy at shutdown, not closing");
            return;
        }
        self.engine.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
