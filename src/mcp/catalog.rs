//! Static tool catalog.
//!
//! Every tool the server knows is a [`ToolId`] variant. The descriptor for
//! each variant (description + JSON input schema) comes from one exhaustive
//! `match`, so adding a variant without a descriptor is a compile error.

use serde::Serialize;
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Tool descriptor
// ---------------------------------------------------------------------------

/// Whether a tool aggregates several underlying queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Compound,
    Granular,
}

/// A tool as advertised in `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(skip)]
    pub kind: ToolKind,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            kind: ToolKind::Granular,
        }
    }

    /// Names listed in the schema's `required` array.
    pub fn required_params(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Keys of `args` that the schema's `properties` does not declare.
    pub fn unknown_params<'a>(&self, args: &'a Map<String, Value>) -> Vec<&'a str> {
        let Some(known) = self.input_schema.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        args.keys()
            .map(String::as_str)
            .filter(|k| !known.contains_key(*k))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ToolId
// ---------------------------------------------------------------------------

macro_rules! tool_ids {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Closed set of tool identities.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ToolId {
            $($variant),+
        }

        impl ToolId {
            /// Every tool, in declaration order.
            pub const ALL: &'static [ToolId] = &[$(ToolId::$variant),+];

            /// Wire name used in `tools/list` and `tools/call`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(ToolId::$variant => $name),+
                }
            }

            /// Reverse lookup by wire name (exact match).
            pub fn from_name(name: &str) -> Option<ToolId> {
                match name {
                    $($name => Some(ToolId::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

tool_ids! {
    // Compound
    Explore => "explore",
    Understand => "understand",
    PrepareChange => "prepareChange",
    BatchGet => "batchGet",
    BatchSearch => "batchSearch",
    // Navigation & search
    SearchSymbols => "searchSymbols",
    GetSymbol => "getSymbol",
    ExplainSymbol => "explainSymbol",
    ExplainFile => "explainFile",
    FindReferences => "findReferences",
    GetCallGraph => "getCallGraph",
    TraceUsage => "traceUsage",
    GetArchitecture => "getArchitecture",
    GetModuleOverview => "getModuleOverview",
    ListKeyConcepts => "listKeyConcepts",
    AnalyzeImpact => "analyzeImpact",
    GetHotspots => "getHotspots",
    GetStatus => "getStatus",
    ExpandToolset => "expandToolset",
    // Review
    SummarizeDiff => "summarizeDiff",
    SummarizePr => "summarizePr",
    GetOwnership => "getOwnership",
    GetOwnershipDrift => "getOwnershipDrift",
    RecentlyRelevant => "recentlyRelevant",
    ScanSecrets => "scanSecrets",
    // Refactor
    JustifySymbol => "justifySymbol",
    AnalyzeCoupling => "analyzeCoupling",
    FindDeadCodeCandidates => "findDeadCodeCandidates",
    FindDeadCode => "findDeadCode",
    GetAffectedTests => "getAffectedTests",
    CompareApi => "compareAPI",
    AuditRisk => "auditRisk",
    ExplainOrigin => "explainOrigin",
    // Federation
    ListFederations => "listFederations",
    FederationStatus => "federationStatus",
    FederationRepos => "federationRepos",
    FederationSearchModules => "federationSearchModules",
    FederationSearchOwnership => "federationSearchOwnership",
    FederationGetHotspots => "federationGetHotspots",
    FederationSync => "federationSync",
    FederationAddRemote => "federationAddRemote",
    FederationRemoveRemote => "federationRemoveRemote",
    FederationListRemote => "federationListRemote",
    FederationSyncRemote => "federationSyncRemote",
    FederationStatusRemote => "federationStatusRemote",
    FederationSearchSymbolsHybrid => "federationSearchSymbolsHybrid",
    FederationListAllRepos => "federationListAllRepos",
    // Docs
    IndexDocs => "indexDocs",
    GetDocsForSymbol => "getDocsForSymbol",
    GetSymbolsInDoc => "getSymbolsInDoc",
    GetDocsForModule => "getDocsForModule",
    CheckDocStaleness => "checkDocStaleness",
    GetDocCoverage => "getDocCoverage",
    // Ops
    Doctor => "doctor",
    Reindex => "reindex",
    DaemonStatus => "daemonStatus",
    ListJobs => "listJobs",
    GetJobStatus => "getJobStatus",
    CancelJob => "cancelJob",
    ListSchedules => "listSchedules",
    RunSchedule => "runSchedule",
    ListWebhooks => "listWebhooks",
    TestWebhook => "testWebhook",
    WebhookDeliveries => "webhookDeliveries",
    GetWideResultMetrics => "getWideResultMetrics",
    // Multi-repo
    ListRepos => "listRepos",
    SwitchRepo => "switchRepo",
    GetActiveRepo => "getActiveRepo",
}

impl ToolId {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolId::Explore
            | ToolId::Understand
            | ToolId::PrepareChange
            | ToolId::BatchGet
            | ToolId::BatchSearch => ToolKind::Compound,
            _ => ToolKind::Granular,
        }
    }

    /// Build the advertised descriptor for this tool.
    pub fn descriptor(&self) -> Tool {
        let (description, schema) = describe(*self);
        Tool {
            name: self.name().to_string(),
            description: description.to_string(),
            input_schema: schema,
            kind: self.kind(),
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The full, ordered list of tool descriptors for this build.
#[derive(Debug, Clone)]
pub struct Catalog {
    tools: Vec<Tool>,
}

impl Catalog {
    /// Catalog of every built-in tool, in declaration order.
    pub fn builtin() -> Self {
        Self {
            tools: ToolId::ALL.iter().map(ToolId::descriptor).collect(),
        }
    }

    /// Catalog over an arbitrary tool list.
    pub fn from_tools(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Schema helpers
// ---------------------------------------------------------------------------

fn object(properties: Value, required: &[&str]) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), properties);
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    Value::Object(schema)
}

fn empty() -> Value {
    object(json!({}), &[])
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn number(default: i64, description: &str) -> Value {
    json!({ "type": "number", "default": default, "description": description })
}

fn boolean(default: bool, description: &str) -> Value {
    json!({ "type": "boolean", "default": default, "description": description })
}

fn string_list(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

fn symbol_only(description: &str) -> Value {
    object(json!({ "symbolId": string(description) }), &["symbolId"])
}

fn describe(id: ToolId) -> (&'static str, Value) {
    use ToolId::*;
    match id {
        // ── Compound ─────────────────────────────────────────────
        Explore => (
            "Explore an area of the codebase: file or module summary, key symbols, call graph and hotspots in one call",
            object(
                json!({
                    "target": string("File path, module path, or symbol name to explore"),
                    "depth": json!({ "type": "string", "enum": ["shallow", "standard", "deep"], "default": "standard" }),
                    "focus": string("Optional aspect to emphasise (structure, dependencies, changes)"),
                }),
                &["target"],
            ),
        ),
        Understand => (
            "Understand a symbol: resolves the name, then returns metadata, explanation, references and call graph",
            object(
                json!({
                    "query": string("Symbol name or stable symbol ID"),
                    "includeReferences": boolean(true, "Include reference locations"),
                    "includeCallGraph": boolean(true, "Include callers and callees"),
                    "maxReferences": number(50, "Maximum references to return"),
                }),
                &["query"],
            ),
        ),
        PrepareChange => (
            "Prepare a change: impact analysis, affected tests, coupled files and risk assessment for a symbol or file",
            object(
                json!({
                    "target": string("Symbol ID or file path that will change"),
                    "changeType": json!({ "type": "string", "enum": ["modify", "rename", "delete", "extract"], "default": "modify" }),
                }),
                &["target"],
            ),
        ),
        BatchGet => (
            "Fetch metadata for several symbols in one call",
            object(
                json!({ "symbolIds": string_list("Stable symbol IDs (max 50)") }),
                &["symbolIds"],
            ),
        ),
        BatchSearch => (
            "Run several symbol searches in one call",
            object(
                json!({
                    "queries": json!({
                        "type": "array",
                        "items": object(json!({ "query": string("Search query"), "kind": string("Symbol kind filter"), "limit": number(10, "Maximum results") }), &["query"]),
                        "description": "Search queries (max 10)",
                    }),
                }),
                &["queries"],
            ),
        ),

        // ── Navigation & search ──────────────────────────────────
        SearchSymbols => (
            "Search for symbols by name with optional filtering",
            object(
                json!({
                    "query": string("Search query (substring match, case-insensitive)"),
                    "scope": string("Optional module ID to limit search scope"),
                    "kinds": string_list("Optional list of symbol kinds to filter (e.g., 'class', 'function')"),
                    "limit": number(20, "Maximum number of results to return"),
                }),
                &["query"],
            ),
        ),
        GetSymbol => (
            "Get symbol metadata and location by stable ID",
            object(
                json!({
                    "symbolId": string("The stable symbol ID (ckb:<repo>:sym:<fingerprint>)"),
                    "repoStateMode": json!({
                        "type": "string",
                        "enum": ["head", "full"],
                        "default": "head",
                        "description": "Whether to use HEAD commit only or full working tree state",
                    }),
                }),
                &["symbolId"],
            ),
        ),
        ExplainSymbol => (
            "Explain a symbol with usage, history, and summary",
            symbol_only("The stable symbol ID to explain"),
        ),
        ExplainFile => (
            "Explain a file: purpose, key symbols, imports and recent history",
            object(json!({ "filePath": string("Repository-relative file path") }), &["filePath"]),
        ),
        FindReferences => (
            "Find all references to a symbol with completeness information",
            object(
                json!({
                    "symbolId": string("The stable symbol ID"),
                    "scope": string("Optional module ID to limit search scope"),
                    "merge": json!({
                        "type": "string",
                        "enum": ["prefer-first", "union"],
                        "default": "prefer-first",
                        "description": "Backend merge strategy",
                    }),
                    "limit": number(100, "Maximum number of references to return"),
                }),
                &["symbolId"],
            ),
        ),
        GetCallGraph => (
            "Return a lightweight call graph rooted at a symbol",
            object(
                json!({
                    "symbolId": string("Root symbol ID"),
                    "direction": json!({ "type": "string", "enum": ["callers", "callees", "both"], "default": "callers" }),
                    "depth": number(1, "Traversal depth (1-4)"),
                }),
                &["symbolId"],
            ),
        ),
        TraceUsage => (
            "Trace how a symbol is reached from entrypoints",
            object(
                json!({
                    "symbolId": string("Symbol to trace"),
                    "maxPaths": number(10, "Maximum number of paths to return"),
                }),
                &["symbolId"],
            ),
        ),
        GetArchitecture => (
            "Get codebase architecture with module dependencies",
            object(
                json!({
                    "depth": number(2, "Maximum dependency depth to traverse"),
                    "includeExternalDeps": boolean(false, "Whether to include external dependencies"),
                    "refresh": boolean(false, "Force refresh of cached architecture"),
                }),
                &[],
            ),
        ),
        GetModuleOverview => (
            "Basic module overview including size and recent commits",
            object(
                json!({
                    "path": string("Module root path"),
                    "name": string("Friendly module name"),
                }),
                &[],
            ),
        ),
        ListKeyConcepts => (
            "List the main domain concepts discovered in the codebase",
            object(json!({ "limit": number(12, "Maximum number of concepts") }), &[]),
        ),
        AnalyzeImpact => (
            "Analyze the impact of changing a symbol",
            object(
                json!({
                    "symbolId": string("The stable symbol ID to analyze"),
                    "depth": number(2, "Maximum depth for transitive impact analysis"),
                }),
                &["symbolId"],
            ),
        ),
        GetHotspots => (
            "Files with the highest churn and complexity over a time window",
            object(
                json!({
                    "timeWindow": string("Time window such as '30d' or '6m'"),
                    "scope": string("Optional module path"),
                    "limit": number(20, "Maximum number of hotspots"),
                }),
                &[],
            ),
        ),
        GetStatus => (
            "Get CKB system status including backend health, cache stats, and repository state",
            empty(),
        ),
        ExpandToolset => (
            "Switch this session to a larger preset. Allowed once per session; the client is notified that the tool list changed",
            object(
                json!({
                    "preset": json!({
                        "type": "string",
                        "enum": ["core", "review", "refactor", "federation", "docs", "ops", "full"],
                        "description": "Preset to expand to",
                    }),
                    "reason": string("Why the additional tools are needed"),
                }),
                &["preset", "reason"],
            ),
        ),

        // ── Review ───────────────────────────────────────────────
        SummarizeDiff => (
            "Summarize a diff between two refs by symbol and risk",
            object(
                json!({
                    "baseRef": string("Base git ref"),
                    "headRef": string("Head git ref (defaults to HEAD)"),
                }),
                &["baseRef"],
            ),
        ),
        SummarizePr => (
            "Summarize a pull request branch: changed modules, owners, and risk signals",
            object(
                json!({
                    "baseBranch": string("Target branch (defaults to main)"),
                    "headBranch": string("Source branch (defaults to current)"),
                }),
                &[],
            ),
        ),
        GetOwnership => (
            "Owners of a file or module from CODEOWNERS and git blame",
            object(json!({ "path": string("File or directory path") }), &["path"]),
        ),
        GetOwnershipDrift => (
            "Modules whose declared owners no longer match who actually changes them",
            object(json!({ "scope": string("Optional module path"), "limit": number(20, "Maximum results") }), &[]),
        ),
        RecentlyRelevant => (
            "Symbols and files recently changed near a given area",
            object(json!({ "path": string("File or module path"), "timeWindow": string("Time window such as '7d'") }), &[]),
        ),
        ScanSecrets => (
            "Scan files for committed secrets and credentials",
            object(
                json!({
                    "scope": string("Optional path to limit the scan"),
                    "minSeverity": json!({ "type": "string", "enum": ["low", "medium", "high", "critical"], "default": "medium" }),
                }),
                &[],
            ),
        ),

        // ── Refactor ─────────────────────────────────────────────
        JustifySymbol => (
            "Provide a keep/investigate/remove style verdict",
            symbol_only("The stable symbol ID to justify"),
        ),
        AnalyzeCoupling => (
            "Files that change together with a target file",
            object(
                json!({
                    "target": string("File path or symbol ID"),
                    "minCorrelation": json!({ "type": "number", "default": 0.3, "description": "Minimum co-change correlation" }),
                }),
                &["target"],
            ),
        ),
        FindDeadCodeCandidates => (
            "Symbols with no observed runtime usage",
            object(json!({ "scope": string("Optional module path"), "limit": number(50, "Maximum results") }), &[]),
        ),
        FindDeadCode => (
            "Statically unreferenced symbols",
            object(
                json!({
                    "scope": string("Optional module path"),
                    "includeExported": boolean(false, "Include exported symbols"),
                }),
                &[],
            ),
        ),
        GetAffectedTests => (
            "Tests affected by changes in the working tree or between refs",
            object(json!({ "baseRef": string("Base git ref (defaults to HEAD)") }), &[]),
        ),
        CompareApi => (
            "Breaking changes in the public API between two refs",
            object(
                json!({
                    "baseRef": string("Base git ref"),
                    "targetRef": string("Target git ref (defaults to working tree)"),
                }),
                &["baseRef"],
            ),
        ),
        AuditRisk => (
            "Rank files by combined risk signals: complexity, churn, ownership, test coverage",
            object(json!({ "limit": number(20, "Maximum results"), "minScore": number(40, "Minimum risk score") }), &[]),
        ),
        ExplainOrigin => (
            "Explain why a symbol exists: originating commits, authors and linked issues",
            symbol_only("The stable symbol ID"),
        ),

        // ── Federation ───────────────────────────────────────────
        ListFederations => ("List configured federations", empty()),
        FederationStatus => (
            "Status of a federation and its member repositories",
            object(json!({ "federation": string("Federation name") }), &["federation"]),
        ),
        FederationRepos => (
            "Repositories in a federation",
            object(json!({ "federation": string("Federation name") }), &["federation"]),
        ),
        FederationSearchModules => (
            "Search modules across all repositories in a federation",
            object(
                json!({ "federation": string("Federation name"), "query": string("Module search query") }),
                &["federation", "query"],
            ),
        ),
        FederationSearchOwnership => (
            "Search code ownership across a federation",
            object(
                json!({ "federation": string("Federation name"), "pattern": string("Path glob") }),
                &["federation", "pattern"],
            ),
        ),
        FederationGetHotspots => (
            "Merged hotspots across a federation",
            object(json!({ "federation": string("Federation name"), "limit": number(20, "Maximum results") }), &["federation"]),
        ),
        FederationSync => (
            "Refresh the federation index from member repositories",
            object(json!({ "federation": string("Federation name") }), &["federation"]),
        ),
        FederationAddRemote => (
            "Add a remote CKB server to a federation",
            object(
                json!({
                    "federation": string("Federation name"),
                    "name": string("Remote name"),
                    "url": string("Remote server URL"),
                }),
                &["federation", "name", "url"],
            ),
        ),
        FederationRemoveRemote => (
            "Remove a remote CKB server from a federation",
            object(
                json!({ "federation": string("Federation name"), "name": string("Remote name") }),
                &["federation", "name"],
            ),
        ),
        FederationListRemote => (
            "List remote servers of a federation",
            object(json!({ "federation": string("Federation name") }), &["federation"]),
        ),
        FederationSyncRemote => (
            "Sync metadata from remote servers",
            object(
                json!({ "federation": string("Federation name"), "name": string("Optional remote name") }),
                &["federation"],
            ),
        ),
        FederationStatusRemote => (
            "Connectivity and sync status of a remote server",
            object(
                json!({ "federation": string("Federation name"), "name": string("Remote name") }),
                &["federation", "name"],
            ),
        ),
        FederationSearchSymbolsHybrid => (
            "Search symbols across local and remote federation members",
            object(
                json!({
                    "federation": string("Federation name"),
                    "query": string("Symbol search query"),
                    "limit": number(20, "Maximum results"),
                }),
                &["federation", "query"],
            ),
        ),
        FederationListAllRepos => (
            "All repositories across local and remote federation members",
            object(json!({ "federation": string("Federation name") }), &["federation"]),
        ),

        // ── Docs ─────────────────────────────────────────────────
        IndexDocs => (
            "Scan documentation and link symbol mentions",
            object(json!({ "force": boolean(false, "Re-index unchanged documents") }), &[]),
        ),
        GetDocsForSymbol => (
            "Documents that mention a symbol",
            object(json!({ "symbol": string("Symbol name or ID") }), &["symbol"]),
        ),
        GetSymbolsInDoc => (
            "Symbols referenced by a document",
            object(json!({ "path": string("Document path") }), &["path"]),
        ),
        GetDocsForModule => (
            "Documents linked to a module",
            object(json!({ "moduleId": string("Module ID") }), &["moduleId"]),
        ),
        CheckDocStaleness => (
            "Find documentation references to symbols that no longer exist",
            object(json!({ "path": string("Optional document path") }), &[]),
        ),
        GetDocCoverage => (
            "Documentation coverage by symbol",
            object(json!({ "exportedOnly": boolean(false, "Only count exported symbols") }), &[]),
        ),

        // ── Ops ──────────────────────────────────────────────────
        Doctor => (
            "Diagnose CKB configuration issues and get suggested fixes",
            empty(),
        ),
        Reindex => (
            "Trigger a reindex of the active repository",
            object(json!({ "scope": string("Optional path to limit reindexing") }), &[]),
        ),
        DaemonStatus => ("Status of the background daemon", empty()),
        ListJobs => (
            "List background jobs",
            object(
                json!({
                    "status": json!({ "type": "string", "enum": ["queued", "running", "completed", "failed", "cancelled"] }),
                    "limit": number(20, "Maximum results"),
                }),
                &[],
            ),
        ),
        GetJobStatus => (
            "Status and progress of a background job",
            object(json!({ "jobId": string("Job ID") }), &["jobId"]),
        ),
        CancelJob => (
            "Cancel a queued or running job",
            object(json!({ "jobId": string("Job ID") }), &["jobId"]),
        ),
        ListSchedules => ("List scheduled tasks", empty()),
        RunSchedule => (
            "Run a scheduled task immediately",
            object(json!({ "scheduleId": string("Schedule ID") }), &["scheduleId"]),
        ),
        ListWebhooks => ("List configured webhooks", empty()),
        TestWebhook => (
            "Send a test event to a webhook",
            object(json!({ "webhookId": string("Webhook ID") }), &["webhookId"]),
        ),
        WebhookDeliveries => (
            "Recent deliveries of a webhook",
            object(json!({ "webhookId": string("Webhook ID"), "limit": number(20, "Maximum results") }), &["webhookId"]),
        ),
        GetWideResultMetrics => (
            "Per-tool call counts, error counts and latency for this session",
            empty(),
        ),

        // ── Multi-repo ───────────────────────────────────────────
        ListRepos => (
            "List registered repositories with their state and which one is active",
            empty(),
        ),
        SwitchRepo => (
            "Switch the active repository",
            object(json!({ "name": string("Registered repository name") }), &["name"]),
        ),
        GetActiveRepo => ("The currently active repository", empty()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
