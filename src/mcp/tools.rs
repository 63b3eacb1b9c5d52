//! `tools/call` routing and the session-level tool handlers.
//!
//! Session tools (`getStatus`, `expandToolset`, `getWideResultMetrics` and
//! the multi-repo tools) read or change session state directly. Every other
//! tool runs on the active repository's engine through a pool lease. All
//! functions here are blocking and run on the blocking thread pool; locks are
//! taken briefly and released before any engine call.

use std::path::Path;

use serde_json::{json, Map, Value};

use super::catalog::{Tool, ToolId};
use super::envelope::Envelope;
use super::presets::{estimate_tool_tokens, format_tokens, preset_infos};
use super::protocol::RpcError;
use super::server::{Shared, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use super::session::ActiveRepo;
use crate::config::PresetName;
use crate::engine::{EngineLease, PoolError};
use crate::error::ToolError;
use crate::workspace::{validate_state, RepoRegistry, RepoState};

/// Failure of a tool handler.
///
/// `Tool` errors are wrapped into the envelope; `Rpc` errors become the
/// JSON-RPC error of the `tools/call` response.
#[derive(Debug)]
pub(crate) enum HandlerError {
    Tool(ToolError),
    Rpc(RpcError),
}

impl From<ToolError> for HandlerError {
    fn from(e: ToolError) -> Self {
        HandlerError::Tool(e)
    }
}

impl From<PoolError> for HandlerError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Open(inner) => HandlerError::Tool(inner),
            exhausted @ PoolError::Exhausted { .. } => HandlerError::Rpc(
                RpcError::internal(exhausted.to_string())
                    .with_data(json!({ "code": "POOL_EXHAUSTED", "retryable": true })),
            ),
        }
    }
}

type HandlerResult = Result<Value, HandlerError>;

/// Result of one `tools/call`.
#[derive(Debug)]
pub(crate) struct ToolOutcome {
    pub envelope: Envelope,
    /// The visible tool list changed; the client must be notified.
    pub list_changed: bool,
}

/// Resolve `name`, validate `args` and run the tool.
pub(crate) fn call_tool(
    shared: &Shared,
    name: &str,
    args: &Map<String, Value>,
) -> Result<ToolOutcome, RpcError> {
    let (Some(id), Some(tool)) = (ToolId::from_name(name), shared.catalog.get(name)) else {
        tracing::debug!(tool = name, "unknown tool");
        let err = ToolError::not_found("tool", name).with_hint("call tools/list to see available tools");
        return Ok(ToolOutcome {
            envelope: Envelope::err(name, err),
            list_changed: false,
        });
    };

    let warnings: Vec<String> = tool
        .unknown_params(args)
        .into_iter()
        .map(|k| format!("ignored unknown argument '{k}'"))
        .collect();

    let result = validate_required(tool, args)
        .map_err(HandlerError::from)
        .and_then(|()| route(shared, id, args));

    let (envelope, list_changed) = match result {
        Ok(data) => (Envelope::ok(name, data), id == ToolId::ExpandToolset),
        Err(HandlerError::Tool(e)) => {
            tracing::debug!(tool = name, code = e.code(), "tool returned an error");
            (Envelope::err(name, e), false)
        }
        Err(HandlerError::Rpc(e)) => return Err(e),
    };
    Ok(ToolOutcome {
        envelope: warnings.into_iter().fold(envelope, |env, w| env.with_warning(w)),
        list_changed,
    })
}

fn route(shared: &Shared, id: ToolId, args: &Map<String, Value>) -> HandlerResult {
    match id {
        ToolId::GetStatus => Ok(status_report(shared)),
        ToolId::ExpandToolset => expand_toolset(shared, args),
        ToolId::GetWideResultMetrics => Ok(shared.metrics.to_json()),
        ToolId::ListRepos => list_repos(shared),
        ToolId::SwitchRepo => switch_repo(shared, args),
        ToolId::GetActiveRepo => get_active_repo(shared),
        other => run_on_active(shared, other, args),
    }
}

/// Every `required` schema property must be present, non-null and, for
/// strings, non-blank.
pub fn validate_required(tool: &Tool, args: &Map<String, Value>) -> Result<(), ToolError> {
    for name in tool.required_params() {
        match args.get(name) {
            None | Some(Value::Null) => {
                return Err(ToolError::invalid_parameter(name, "missing required parameter"))
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(ToolError::invalid_parameter(name, "must not be empty"))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::invalid_parameter(name, "expected a non-empty string"))
}

// ---------------------------------------------------------------------------
// Engine tools
// ---------------------------------------------------------------------------

/// Lease the engine for the active repository.
pub(crate) fn acquire_active(shared: &Shared) -> Result<EngineLease, HandlerError> {
    let active = shared.read_session().active_repo.clone();
    let Some(active) = active else {
        return Err(ToolError::precondition(
            "no active repository",
            "call switchRepo, or set a default repository in the registry",
        )
        .into());
    };
    Ok(shared.provider.acquire(&active.path, &active.name)?)
}

/// Run an analysis tool on the active repository's engine.
pub(crate) fn run_on_active(shared: &Shared, id: ToolId, args: &Map<String, Value>) -> HandlerResult {
    let lease = acquire_active(shared)?;
    Ok(lease.execute(id, args)?)
}

// ---------------------------------------------------------------------------
// Session tools
// ---------------------------------------------------------------------------

/// Snapshot for `getStatus` and `ckb://status`.
pub(crate) fn status_report(shared: &Shared) -> Value {
    let (view, expanded, active, roots, roots_enabled, client) = {
        let s = shared.read_session();
        (
            s.view(),
            s.is_expanded(),
            s.active_repo.clone(),
            s.roots.clone(),
            s.roots_enabled(),
            s.client_info.clone(),
        )
    };

    // Only report on engines that are already open; status never opens one.
    let backend = match &active {
        Some(repo) => match shared.provider.peek(&repo.path) {
            Some(lease) => lease.status(),
            None => json!({ "loaded": false }),
        },
        None => Value::Null,
    };

    json!({
        "status": "ok",
        "server": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
            "protocolVersion": PROTOCOL_VERSION,
        },
        "session": {
            "preset": view.preset,
            "fingerprint": view.fingerprint,
            "expanded": expanded,
            "toolCount": view.tools.len(),
            "tokenEstimate": format_tokens(estimate_tool_tokens(&view.tools)),
            "rootsEnabled": roots_enabled,
            "roots": roots,
            "client": client,
        },
        "multiRepo": shared.provider.is_multi_repo(),
        "activeRepo": active,
        "engines": shared.provider.entries(),
        "backend": backend,
        "presets": preset_infos(shared.catalog.tools()),
        "metrics": shared.metrics.to_json(),
    })
}

fn expand_toolset(shared: &Shared, args: &Map<String, Value>) -> HandlerResult {
    let raw = str_arg(args, "preset")?;
    let Some(preset) = PresetName::from_str_loose(raw) else {
        let summary: Vec<String> = preset_infos(shared.catalog.tools())
            .iter()
            .map(|p| format!("{} ({} tools)", p.name, p.tool_count))
            .collect();
        return Err(ToolError::invalid_parameter(
            "preset",
            format!("unknown preset '{raw}'; valid presets: {}", PresetName::valid_names()),
        )
        .with_hint(summary.join(", "))
        .into());
    };
    let reason = str_arg(args, "reason")?;

    let (previous, view) = {
        let mut s = shared.write_session();
        let previous = s.preset();
        if !s.expand(&shared.catalog, preset) {
            return Err(ToolError::rate_limited("expandToolset can only be called once per session")
                .with_hint(format!(
                    "the session is already on the '{previous}' preset; start a new session to choose another"
                ))
                .into());
        }
        (previous, s.view())
    };

    tracing::info!(from = %previous, to = %preset, reason, tools = view.tools.len(), "toolset expanded");
    Ok(json!({
        "previousPreset": previous,
        "preset": view.preset,
        "toolCount": view.tools.len(),
        "fingerprint": view.fingerprint,
        "tokenEstimate": format_tokens(estimate_tool_tokens(&view.tools)),
        "reason": reason,
    }))
}

// ---------------------------------------------------------------------------
// Multi-repo tools
// ---------------------------------------------------------------------------

fn require_multi(shared: &Shared) -> Result<(), ToolError> {
    if shared.provider.is_multi_repo() {
        Ok(())
    } else {
        Err(ToolError::precondition(
            "multi-repo mode not enabled",
            "start the server with --registry <file>",
        ))
    }
}

fn load_registry(shared: &Shared) -> Result<RepoRegistry, ToolError> {
    let Some(file) = shared.config.repos_file.as_deref() else {
        return Err(ToolError::precondition(
            "no repository registry configured",
            "start the server with --registry <file>",
        ));
    };
    RepoRegistry::load(file).map_err(|e| ToolError::operation("load registry", e))
}

fn list_repos(shared: &Shared) -> HandlerResult {
    require_multi(shared)?;
    let registry = load_registry(shared)?;
    let active = shared.read_session().active_repo.clone();
    let active_name = active.as_ref().map(|a| a.name.as_str());

    let repos: Vec<Value> = registry
        .list()
        .iter()
        .map(|entry| {
            let path = registry.resolve(entry);
            json!({
                "name": entry.name,
                "path": path,
                "state": validate_state(&path),
                "isDefault": registry.default_name() == Some(entry.name.as_str()),
                "isActive": active_name == Some(entry.name.as_str()),
                "isLoaded": shared.provider.is_loaded(&path),
            })
        })
        .collect();

    Ok(json!({
        "repos": repos,
        "activeRepo": active_name,
        "default": registry.default_name(),
    }))
}

fn switch_repo(shared: &Shared, args: &Map<String, Value>) -> HandlerResult {
    require_multi(shared)?;
    let name = str_arg(args, "name")?;
    let registry = load_registry(shared)?;

    let Some((entry, path, state)) = registry.lookup(name) else {
        return Err(ToolError::not_found("repository", name)
            .with_hint("call listRepos to see registered repositories")
            .into());
    };
    check_usable(&path, state, registry.file())?;

    // Open (or touch) the engine now so failures surface on the switch.
    let lease = shared.provider.acquire(&path, &entry.name)?;
    drop(lease);

    shared.write_session().active_repo = Some(ActiveRepo {
        name: entry.name.clone(),
        path: path.clone(),
    });
    tracing::info!(repo = %entry.name, path = %path.display(), "switched active repository");

    Ok(json!({
        "success": true,
        "activeRepo": entry.name,
        "path": path,
    }))
}

fn check_usable(path: &Path, state: RepoState, registry_file: &Path) -> Result<(), ToolError> {
    match state {
        RepoState::Valid => Ok(()),
        RepoState::Missing => Err(ToolError::precondition(
            format!("path does not exist: {}", path.display()),
            format!("remove the entry from {}", registry_file.display()),
        )),
        RepoState::Uninitialized => Err(ToolError::precondition(
            format!("repository not initialized: {}", path.display()),
            format!("run: cd {} && ckb init", path.display()),
        )),
    }
}

fn get_active_repo(shared: &Shared) -> HandlerResult {
    require_multi(shared)?;
    let active = shared.read_session().active_repo.clone();
    Ok(match active {
        None => json!({
            "name": null,
            "state": "none",
            "message": "No active repository. Call switchRepo first or set a default.",
        }),
        Some(repo) => json!({
            "name": repo.name,
            "path": repo.path,
            "state": validate_state(&repo.path),
            "isLoaded": shared.provider.is_loaded(&repo.path),
        }),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
