//! MCP server over newline-delimited JSON-RPC.
//!
//! One sequential read loop classifies every inbound frame and routes it:
//! requests through the method table, notifications to their side effects
//! (never a reply), and responses to the pending-request registry. The
//! server may itself send `roots/list` to the client; the reply is awaited by
//! a spawned task so the read loop never blocks on it.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use super::catalog::Catalog;
use super::pagination::{decode_cursor, paginate};
use super::pending::PendingRequests;
use super::protocol::{decode_frame, salvage_id_from_text, DecodeError, Message, MessageKind, RpcError, METHOD_NOT_FOUND};
use super::resources::{self, ResourceRef};
use super::roots::{parse_client_capabilities, parse_roots_response, Root};
use super::session::{ActiveRepo, SessionState};
use super::tools::{self, HandlerError};
use super::transport::{Frame, FrameReader, FrameWriter};
use crate::config::{PresetName, ServerConfig};
use crate::engine::EngineProvider;
use crate::error::Result;
use crate::observability::Metrics;
use crate::workspace::{RepoRegistry, RepoState};

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "ckb";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// State shared between the read loop, tool tasks and roots waiters.
pub(crate) struct Shared {
    pub(crate) catalog: Catalog,
    pub(crate) config: ServerConfig,
    pub(crate) provider: Arc<dyn EngineProvider>,
    pub(crate) session: RwLock<SessionState>,
    pub(crate) pending: PendingRequests,
    pub(crate) metrics: Metrics,
}

impl Shared {
    pub(crate) fn read_session(&self) -> RwLockReadGuard<'_, SessionState> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn write_session(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// One client session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct McpServer {
    shared: Arc<Shared>,
}

impl McpServer {
    pub fn new(config: ServerConfig, catalog: Catalog, provider: Arc<dyn EngineProvider>) -> Self {
        let mut session = SessionState::new(&catalog, config.preset);
        session.active_repo = initial_repo(&config, provider.as_ref());
        if let Some(repo) = &session.active_repo {
            tracing::info!(repo = %repo.name, path = %repo.path.display(), "active repository");
        }
        Self {
            shared: Arc::new(Shared {
                catalog,
                config,
                provider,
                session: RwLock::new(session),
                pending: PendingRequests::new(),
                metrics: Metrics::new(),
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn preset(&self) -> PresetName {
        self.shared.read_session().preset()
    }

    pub fn fingerprint(&self) -> String {
        self.shared.read_session().fingerprint().to_string()
    }

    pub fn roots(&self) -> Vec<Root> {
        self.shared.read_session().roots.clone()
    }

    pub fn roots_enabled(&self) -> bool {
        self.shared.read_session().roots_enabled()
    }

    pub fn active_repo(&self) -> Option<ActiveRepo> {
        self.shared.read_session().active_repo.clone()
    }

    /// Server-initiated requests still awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    // -----------------------------------------------------------------------
    // Read loop
    // -----------------------------------------------------------------------

    /// Serve until `reader` reaches end of stream.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FrameReader::new(reader, self.shared.config.max_frame_bytes);
        let mut out = FrameWriter::new(writer);
        tracing::info!(preset = %self.preset(), "serving on stdio");

        loop {
            let outgoing = match frames.next_frame().await? {
                Frame::Eof => break,
                Frame::Oversized { len, prefix } => {
                    tracing::warn!(len, limit = self.shared.config.max_frame_bytes, "frame too large");
                    salvage_id_from_text(&String::from_utf8_lossy(&prefix))
                        .map(|id| {
                            Message::error_response(
                                Some(id),
                                RpcError::parse_error(format!("message too large: {len} bytes")),
                            )
                        })
                        .into_iter()
                        .collect()
                }
                Frame::Line(bytes) => match decode_frame(&bytes) {
                    Ok(msg) => self.handle_message(msg).await,
                    Err(DecodeError::Reply { id, detail }) => {
                        tracing::warn!(?id, %detail, "dropping malformed reply");
                        Vec::new()
                    }
                    Err(e) => {
                        tracing::debug!(error = ?e, "undecodable frame");
                        e.into_response().into_iter().collect()
                    }
                },
            };

            for msg in outgoing {
                if let Err(e) = out.write_message(&msg).await {
                    tracing::warn!(error = %e, "failed to write message");
                    if msg.is_request() {
                        if let Some(id) = msg.numeric_id() {
                            self.shared.pending.cancel(id);
                        }
                    }
                }
            }
        }

        tracing::info!("input closed, shutting down");
        self.shared.pending.cancel_all();
        Ok(())
    }

    /// Close engines and drop pending requests.
    pub fn shutdown(&self) {
        self.shared.pending.cancel_all();
        self.shared.provider.close_all();
    }

    /// Handle one decoded message; returns what to write, in order.
    pub async fn handle_message(&self, msg: Message) -> Vec<Message> {
        match msg.kind() {
            MessageKind::Request => self.handle_request(msg).await,
            MessageKind::Notification => self.handle_notification(&msg).into_iter().collect(),
            MessageKind::Response => {
                self.handle_response(msg);
                Vec::new()
            }
            MessageKind::Invalid => {
                let id = msg.id.filter(|v| v.is_number() || v.is_string());
                tracing::debug!(?id, "invalid message");
                vec![Message::error_response(
                    id,
                    RpcError::invalid_request("Invalid Request: expected a request, notification or response"),
                )]
            }
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    async fn handle_request(&self, msg: Message) -> Vec<Message> {
        let id = msg.id.clone().unwrap_or(Value::Null);
        let method = msg.method_str();
        tracing::debug!(method, ?id, "request");

        let mut trailing = Vec::new();
        let result = match method {
            "initialize" => Ok(self.handle_initialize(msg.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_list_tools(msg.params.as_ref()),
            "tools/call" => match self.handle_call_tool(msg.params.as_ref()).await {
                Ok((result, list_changed)) => {
                    if list_changed {
                        trailing.push(Message::notification("notifications/tools/list_changed", None));
                    }
                    Ok(result)
                }
                Err(e) => Err(e),
            },
            "resources/list" => Ok(resources::list_result()),
            "resources/read" => self.handle_read_resource(msg.params.as_ref()).await,
            other => Err(RpcError::method_not_found(other)),
        };

        let response = match result {
            Ok(value) => Message::response(id, value),
            Err(e) => {
                tracing::debug!(method, code = e.code, message = %e.message, "request failed");
                Message::error_response(Some(id), e)
            }
        };
        let mut out = vec![response];
        out.extend(trailing);
        out
    }

    fn handle_initialize(&self, params: Option<&Value>) -> Value {
        let caps = parse_client_capabilities(params);
        let client_info = params.and_then(|p| p.get("clientInfo")).cloned();
        {
            let mut s = self.shared.write_session();
            s.set_roots_supported(caps.roots.is_some());
            s.client_info = client_info.clone();
        }
        tracing::info!(
            client = ?client_info.as_ref().and_then(|c| c.get("name")),
            roots = caps.roots.is_some(),
            "client initialized"
        );
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": true },
                "resources": {},
            },
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
        })
    }

    fn handle_list_tools(&self, params: Option<&Value>) -> std::result::Result<Value, RpcError> {
        let cursor = match params.and_then(|p| p.get("cursor")) {
            None | Some(Value::Null) => "",
            Some(Value::String(s)) => s.as_str(),
            Some(_) => return Err(RpcError::invalid_params("cursor must be a string")),
        };

        let view = self.shared.read_session().view();
        let offset = decode_cursor(cursor, view.preset, &view.fingerprint)
            .map_err(|e| RpcError::invalid_params(format!("invalid cursor: {e}")))?;
        let page_size = self.shared.config.effective_page_size();
        let page = paginate(
            &view.tools,
            i64::try_from(offset).unwrap_or(i64::MAX),
            i64::try_from(page_size).unwrap_or(i64::MAX),
            view.preset,
            &view.fingerprint,
        );

        let mut result = json!({ "tools": page.items });
        if let Some(next) = page.next_cursor {
            result["nextCursor"] = Value::String(next);
        }
        Ok(result)
    }

    async fn handle_call_tool(&self, params: Option<&Value>) -> std::result::Result<(Value, bool), RpcError> {
        let params = params.and_then(Value::as_object);
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires a string 'name'"))?
            .to_string();
        let args = match params.and_then(|p| p.get("arguments")) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(args)) => args.clone(),
            Some(_) => return Err(RpcError::invalid_params("'arguments' must be an object")),
        };

        tracing::info!(tool = %name, "calling tool");
        let started = Instant::now();
        let shared = self.shared.clone();
        let tool_name = name.clone();
        let outcome = tokio::task::spawn_blocking(move || tools::call_tool(&shared, &tool_name, &args))
            .await
            .map_err(|e| RpcError::internal(format!("tool {name} failed: {e}")))??;

        let elapsed = started.elapsed();
        self.shared
            .metrics
            .record(&name, elapsed, outcome.envelope.is_error());
        let envelope = outcome
            .envelope
            .with_duration_ms(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        Ok((envelope.into_call_result(), outcome.list_changed))
    }

    async fn handle_read_resource(&self, params: Option<&Value>) -> std::result::Result<Value, RpcError> {
        let uri = params
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| RpcError::invalid_params("resources/read requires a 'uri'"))?
            .to_string();
        let resource = resources::parse_resource_uri(&uri)?;

        let shared = self.shared.clone();
        let body = tokio::task::spawn_blocking(move || read_resource_body(&shared, &resource))
            .await
            .map_err(|e| RpcError::internal(format!("resource read failed: {e}")))??;
        Ok(resources::read_result(&uri, &body))
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    fn handle_notification(&self, msg: &Message) -> Option<Message> {
        match msg.method_str() {
            "notifications/initialized" | "notifications/roots/list_changed" => {
                if self.roots_enabled() {
                    Some(self.request_roots())
                } else {
                    None
                }
            }
            "notifications/cancelled" => {
                tracing::debug!(params = ?msg.params, "client cancelled a request");
                None
            }
            other => {
                tracing::debug!(method = other, "ignoring notification");
                None
            }
        }
    }

    /// Build a `roots/list` request and spawn the task awaiting its reply.
    ///
    /// The caller writes the returned message; if that write fails it must
    /// cancel the id, which ends the waiter.
    fn request_roots(&self) -> Message {
        let pending = &self.shared.pending;
        let id = pending.next_id();
        let rx = pending.register(id);
        let guard = pending.guard(id);
        let timeout = self.shared.config.roots_timeout();
        let server = self.clone();

        tokio::spawn(async move {
            let _guard = guard;
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(reply)) => server.apply_roots_reply(reply),
                Ok(Err(_)) => tracing::debug!(id, "roots request cancelled"),
                Err(_) => tracing::warn!(
                    id,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "roots/list timed out"
                ),
            }
        });

        tracing::debug!(id, "requesting roots");
        Message::request(id, "roots/list", None)
    }

    fn apply_roots_reply(&self, reply: Message) {
        if let Some(err) = reply.error {
            if err.code == METHOD_NOT_FOUND {
                tracing::info!("client does not implement roots/list; disabling roots");
                self.shared.write_session().disable_roots();
            } else {
                tracing::warn!(code = err.code, message = %err.message, "roots/list failed");
            }
            return;
        }
        match reply.result.as_ref().and_then(parse_roots_response) {
            Some(roots) => {
                tracing::info!(count = roots.len(), "client roots updated");
                self.shared.write_session().roots = roots;
            }
            None => tracing::warn!("malformed roots/list result"),
        }
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    fn handle_response(&self, msg: Message) {
        match msg.numeric_id() {
            Some(id) => {
                if !self.shared.pending.resolve(id, msg) {
                    tracing::debug!(id, "response for unknown or expired request dropped");
                }
            }
            None => tracing::debug!(id = ?msg.id, "response with non-numeric id dropped"),
        }
    }
}

fn read_resource_body(shared: &Shared, resource: &ResourceRef) -> std::result::Result<Value, RpcError> {
    let Some((tool, args)) = resource.engine_call() else {
        return Ok(tools::status_report(shared));
    };
    let args = args.as_object().cloned().unwrap_or_default();
    match tools::run_on_active(shared, tool, &args) {
        Ok(data) => Ok(data),
        Err(HandlerError::Tool(e)) => Ok(json!({ "error": e })),
        Err(HandlerError::Rpc(e)) => Err(e),
    }
}

/// The repository a new session starts on.
fn initial_repo(config: &ServerConfig, provider: &dyn EngineProvider) -> Option<ActiveRepo> {
    if !provider.is_multi_repo() {
        return provider.entries().into_iter().next().map(|e| ActiveRepo {
            name: e.repo_name,
            path: e.repo_path,
        });
    }
    let file = config.repos_file.as_deref()?;
    let registry = match RepoRegistry::load(file) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "could not load repository registry");
            return None;
        }
    };
    let name = registry.default_name()?;
    let (entry, path, state) = registry.lookup(name)?;
    if state != RepoState::Valid {
        tracing::warn!(repo = name, state = state.as_str(), "default repository is not usable");
        return None;
    }
    Some(ActiveRepo {
        name: entry.name.clone(),
        path,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{LocalRepoEngine, SingleEngine};
    use crate::mcp::protocol::{INVALID_PARAMS, INVALID_REQUEST};
    use pretty_assertions::assert_eq as pa_eq;
    use tempfile::TempDir;

    fn server(dir: &TempDir) -> McpServer {
        let engine = Arc::new(LocalRepoEngine::open(dir.path()).unwrap());
        McpServer::new(
            ServerConfig::default(),
            Catalog::builtin(),
            Arc::new(SingleEngine::new(engine, "local")),
        )
    }

    fn request(id: i64, method: &str, params: Value) -> Message {
        Message::request(id, method, Some(params))
    }

    #[tokio::test]
    async fn initialize_records_roots_capability() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        let out = s
            .handle_message(request(1, "initialize", json!({"capabilities": {"roots": {}}})))
            .await;
        pa_eq!(out.len(), 1);
        let result = out[0].result.clone().unwrap();
        pa_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        pa_eq!(result["serverInfo"]["name"], "ckb");
        pa_eq!(result["capabilities"]["tools"]["listChanged"], true);
        assert!(s.roots_enabled());
    }

    #[tokio::test]
    async fn initialized_sends_roots_request_only_when_supported() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        let note = Message::notification("notifications/initialized", None);
        assert!(s.handle_message(note.clone()).await.is_empty());

        s.handle_message(request(1, "initialize", json!({"capabilities": {"roots": {}}})))
            .await;
        let out = s.handle_message(note).await;
        pa_eq!(out.len(), 1);
        pa_eq!(out[0].method_str(), "roots/list");
        pa_eq!(s.pending_requests(), 1);
    }

    #[tokio::test]
    async fn unknown_method() {
        let dir = TempDir::new().unwrap();
        let out = server(&dir).handle_message(request(3, "foo/bar", json!({}))).await;
        let err = out[0].error.clone().unwrap();
        pa_eq!(err.code, METHOD_NOT_FOUND);
        pa_eq!(out[0].id, Some(json!(3)));
    }

    #[tokio::test]
    async fn notifications_never_reply() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        for method in ["notifications/unknown", "notifications/cancelled", "tools/list"] {
            assert!(s.handle_message(Message::notification(method, None)).await.is_empty());
        }
    }

    #[tokio::test]
    async fn invalid_message_gets_invalid_request() {
        let dir = TempDir::new().unwrap();
        let msg: Message = serde_json::from_value(json!({"jsonrpc": "2.0", "id": 8})).unwrap();
        let out = server(&dir).handle_message(msg).await;
        pa_eq!(out[0].error.clone().unwrap().code, INVALID_REQUEST);
        pa_eq!(out[0].id, Some(json!(8)));
    }

    #[tokio::test]
    async fn orphan_response_is_dropped() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        let out = s.handle_message(Message::response(json!(99), json!({}))).await;
        assert!(out.is_empty());
        pa_eq!(s.pending_requests(), 0);
    }

    #[tokio::test]
    async fn list_tools_first_page() {
        let dir = TempDir::new().unwrap();
        let out = server(&dir).handle_message(request(1, "tools/list", json!({}))).await;
        let result = out[0].result.clone().unwrap();
        pa_eq!(result["tools"].as_array().unwrap().len(), 15);
        pa_eq!(result["tools"][0]["name"], "explore");
        assert!(result["tools"][0]["inputSchema"].is_object());
        assert!(result["nextCursor"].is_string());
    }

    #[tokio::test]
    async fn list_tools_bad_cursor() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        for cursor in [json!("!!!"), json!(5)] {
            let out = s.handle_message(request(1, "tools/list", json!({"cursor": cursor}))).await;
            pa_eq!(out[0].error.clone().unwrap().code, INVALID_PARAMS);
        }
    }

    #[tokio::test]
    async fn call_tool_param_errors() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        for params in [json!({}), json!({"name": 5}), json!({"name": "getStatus", "arguments": [1]})] {
            let out = s.handle_message(request(1, "tools/call", params)).await;
            pa_eq!(out[0].error.clone().unwrap().code, INVALID_PARAMS);
        }
    }

    #[tokio::test]
    async fn expand_emits_list_changed_after_response() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        let out = s
            .handle_message(request(
                2,
                "tools/call",
                json!({"name": "expandToolset", "arguments": {"preset": "ops", "reason": "daemon work"}}),
            ))
            .await;
        pa_eq!(out.len(), 2);
        pa_eq!(out[0].result.clone().unwrap()["isError"], false);
        pa_eq!(out[1].method_str(), "notifications/tools/list_changed");
        pa_eq!(s.preset(), PresetName::Ops);
        pa_eq!(s.metrics().get("expandToolset").unwrap().calls, 1);
    }

    #[tokio::test]
    async fn read_status_resource() {
        let dir = TempDir::new().unwrap();
        let out = server(&dir)
            .handle_message(request(1, "resources/read", json!({"uri": "ckb://status"})))
            .await;
        let result = out[0].result.clone().unwrap();
        pa_eq!(result["contents"][0]["uri"], "ckb://status");
        let text: Value =
            serde_json::from_str(result["contents"][0]["text"].as_str().unwrap()).unwrap();
        pa_eq!(text["session"]["preset"], "core");
    }

    #[tokio::test]
    async fn read_module_resource_wraps_backend_error() {
        let dir = TempDir::new().unwrap();
        let out = server(&dir)
            .handle_message(request(1, "resources/read", json!({"uri": "ckb://module/internal/api"})))
            .await;
        let result = out[0].result.clone().unwrap();
        let text: Value =
            serde_json::from_str(result["contents"][0]["text"].as_str().unwrap()).unwrap();
        pa_eq!(text["error"]["code"], "BACKEND_UNAVAILABLE");
    }

    #[tokio::test]
    async fn read_resource_missing_uri() {
        let dir = TempDir::new().unwrap();
        let out = server(&dir)
            .handle_message(request(1, "resources/read", json!({})))
            .await;
        pa_eq!(out[0].error.clone().unwrap().code, INVALID_PARAMS);
    }

    #[test]
    fn single_mode_starts_on_its_repo() {
        let dir = TempDir::new().unwrap();
        let s = server(&dir);
        pa_eq!(s.active_repo().unwrap().name, "local");
    }
}
