//! Per-connection session state.
//!
//! Everything a client can change during a session lives in one
//! [`SessionState`] behind a single `RwLock` owned by the server: the active
//! preset together with its filtered tool view and fingerprint, the one-way
//! expansion latch, the active repository, and the client's roots.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::catalog::{Catalog, Tool};
use super::presets::{filter_and_order, toolset_fingerprint};
use super::roots::Root;
use crate::config::PresetName;

/// The repository tool calls run against when they don't name one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveRepo {
    pub name: String,
    pub path: PathBuf,
}

/// Immutable snapshot of what `tools/list` serves.
#[derive(Debug, Clone)]
pub struct ToolsetView {
    pub preset: PresetName,
    pub fingerprint: String,
    pub tools: Arc<[Tool]>,
}

#[derive(Debug)]
pub struct SessionState {
    preset: PresetName,
    fingerprint: String,
    tools: Arc<[Tool]>,
    expanded: bool,
    pub active_repo: Option<ActiveRepo>,
    pub roots: Vec<Root>,
    roots_supported: bool,
    roots_disabled: bool,
    pub client_info: Option<Value>,
}

impl SessionState {
    pub fn new(catalog: &Catalog, preset: PresetName) -> Self {
        let mut state = Self {
            preset,
            fingerprint: String::new(),
            tools: Arc::from(Vec::new()),
            expanded: false,
            active_repo: None,
            roots: Vec::new(),
            roots_supported: false,
            roots_disabled: false,
            client_info: None,
        };
        state.apply_preset(catalog, preset);
        state
    }

    /// Preset, tool view and fingerprint always change together.
    fn apply_preset(&mut self, catalog: &Catalog, preset: PresetName) {
        let tools = filter_and_order(catalog.tools(), preset);
        self.fingerprint = toolset_fingerprint(&tools);
        self.tools = Arc::from(tools);
        self.preset = preset;
    }

    pub fn preset(&self) -> PresetName {
        self.preset
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn view(&self) -> ToolsetView {
        ToolsetView {
            preset: self.preset,
            fingerprint: self.fingerprint.clone(),
            tools: self.tools.clone(),
        }
    }

    /// Switch to `preset` and close the expansion latch.
    ///
    /// Returns `false` without changing anything if the latch is already
    /// closed.
    pub fn expand(&mut self, catalog: &Catalog, preset: PresetName) -> bool {
        if self.expanded {
            return false;
        }
        self.apply_preset(catalog, preset);
        self.expanded = true;
        true
    }

    pub fn set_roots_supported(&mut self, supported: bool) {
        self.roots_supported = supported;
    }

    /// The client said it implements roots but answered `roots/list` with
    /// method-not-found. Stays off for the rest of the session.
    pub fn disable_roots(&mut self) {
        self.roots_disabled = true;
    }

    pub fn roots_enabled(&self) -> bool {
        self.roots_supported && !self.roots_disabled
    }

    pub fn roots_supported(&self) -> bool {
        self.roots_supported
    }

    pub fn roots_disabled(&self) -> bool {
        self.roots_disabled
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;

    #[test]
    fn new_session_uses_preset_view() {
        let catalog = Catalog::builtin();
        let s = SessionState::new(&catalog, PresetName::Core);
        let view = s.view();
        pa_eq!(view.preset, PresetName::Core);
        pa_eq!(view.tools.len(), 19);
        pa_eq!(view.fingerprint, toolset_fingerprint(&view.tools));
        assert!(!s.is_expanded());
    }

    #[test]
    fn expand_is_one_shot() {
        let catalog = Catalog::builtin();
        let mut s = SessionState::new(&catalog, PresetName::Core);
        let before = s.fingerprint().to_string();

        assert!(s.expand(&catalog, PresetName::Review));
        pa_eq!(s.preset(), PresetName::Review);
        assert!(s.is_expanded());
        assert_ne!(s.fingerprint(), before);

        assert!(!s.expand(&catalog, PresetName::Full));
        pa_eq!(s.preset(), PresetName::Review);
    }

    #[test]
    fn roots_gate() {
        let catalog = Catalog::builtin();
        let mut s = SessionState::new(&catalog, PresetName::Core);
        assert!(!s.roots_enabled());
        s.set_roots_supported(true);
        assert!(s.roots_enabled());
        s.disable_roots();
        assert!(!s.roots_enabled());
        s.set_roots_supported(true);
        assert!(!s.roots_enabled());
    }
}
