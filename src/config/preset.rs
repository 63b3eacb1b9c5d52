//! Preset definitions: core, review, refactor, federation, docs, ops, full.
//!
//! Core must support one complete "investigate and assess impact" workflow
//! without expansion. Every other preset is core plus a role-specific set of
//! tools; full is the wildcard.

use super::schema::PresetName;
use crate::mcp::catalog::ToolId;

// ---------------------------------------------------------------------------
// Tool lists
// ---------------------------------------------------------------------------

/// Tools that always lead page one, in this order, for every preset.
pub const CANONICAL_ORDER: &[ToolId] = &[
    // Compound tools come first
    ToolId::Explore,
    ToolId::Understand,
    ToolId::PrepareChange,
    ToolId::BatchGet,
    ToolId::BatchSearch,
    // Granular fallbacks
    ToolId::SearchSymbols,
    ToolId::GetSymbol,
    ToolId::ExplainSymbol,
    ToolId::ExplainFile,
    ToolId::FindReferences,
    ToolId::GetCallGraph,
    ToolId::TraceUsage,
    ToolId::GetArchitecture,
    ToolId::GetModuleOverview,
    ToolId::ListKeyConcepts,
    ToolId::AnalyzeImpact,
    ToolId::GetHotspots,
    ToolId::GetStatus,
    ToolId::ExpandToolset,
];

/// The default preset's tools.
pub const CORE_TOOLS: &[ToolId] = CANONICAL_ORDER;

const REVIEW_EXTRAS: &[ToolId] = &[
    ToolId::SummarizeDiff,
    ToolId::SummarizePr,
    ToolId::GetOwnership,
    ToolId::GetOwnershipDrift,
    ToolId::RecentlyRelevant,
    ToolId::ScanSecrets,
];

const REFACTOR_EXTRAS: &[ToolId] = &[
    ToolId::JustifySymbol,
    ToolId::AnalyzeCoupling,
    ToolId::FindDeadCodeCandidates,
    ToolId::FindDeadCode,
    ToolId::GetAffectedTests,
    ToolId::CompareApi,
    ToolId::AuditRisk,
    ToolId::ExplainOrigin,
    ToolId::ScanSecrets,
];

const FEDERATION_EXTRAS: &[ToolId] = &[
    ToolId::ListFederations,
    ToolId::FederationStatus,
    ToolId::FederationRepos,
    ToolId::FederationSearchModules,
    ToolId::FederationSearchOwnership,
    ToolId::FederationGetHotspots,
    ToolId::FederationSync,
    ToolId::FederationAddRemote,
    ToolId::FederationRemoveRemote,
    ToolId::FederationListRemote,
    ToolId::FederationSyncRemote,
    ToolId::FederationStatusRemote,
    ToolId::FederationSearchSymbolsHybrid,
    ToolId::FederationListAllRepos,
];

const DOCS_EXTRAS: &[ToolId] = &[
    ToolId::IndexDocs,
    ToolId::GetDocsForSymbol,
    ToolId::GetSymbolsInDoc,
    ToolId::GetDocsForModule,
    ToolId::CheckDocStaleness,
    ToolId::GetDocCoverage,
];

const OPS_EXTRAS: &[ToolId] = &[
    ToolId::Doctor,
    ToolId::Reindex,
    ToolId::DaemonStatus,
    ToolId::ListJobs,
    ToolId::GetJobStatus,
    ToolId::CancelJob,
    ToolId::ListSchedules,
    ToolId::RunSchedule,
    ToolId::ListWebhooks,
    ToolId::TestWebhook,
    ToolId::WebhookDeliveries,
    ToolId::GetWideResultMetrics,
];

// ---------------------------------------------------------------------------
// PresetDefinition
// ---------------------------------------------------------------------------

/// Which tools a preset selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    /// The whole catalog.
    All,
    /// Exactly these tools (order irrelevant; duplicates harmless).
    Only(Vec<ToolId>),
}

impl ToolSelection {
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.iter().any(|id| id.name() == name),
        }
    }
}

/// Describes a single preset.
#[derive(Debug, Clone)]
pub struct PresetDefinition {
    pub name: PresetName,
    pub description: &'static str,
    pub tools: ToolSelection,
}

/// Get the preset definition for a given name.
pub fn get_preset(name: PresetName) -> PresetDefinition {
    let (description, tools) = match name {
        PresetName::Core => (
            "Quick navigation, search, impact analysis",
            ToolSelection::Only(CORE_TOOLS.to_vec()),
        ),
        PresetName::Review => (
            "Code review with ownership and PR summaries",
            core_plus(REVIEW_EXTRAS),
        ),
        PresetName::Refactor => (
            "Refactoring analysis with coupling and dead code",
            core_plus(REFACTOR_EXTRAS),
        ),
        PresetName::Federation => (
            "Multi-repo queries and cross-repo visibility",
            core_plus(FEDERATION_EXTRAS),
        ),
        PresetName::Docs => (
            "Documentation-symbol linking and coverage",
            core_plus(DOCS_EXTRAS),
        ),
        PresetName::Ops => ("Diagnostics, daemon, webhooks, jobs", core_plus(OPS_EXTRAS)),
        PresetName::Full => ("Complete feature set (all tools)", ToolSelection::All),
    };
    PresetDefinition {
        name,
        description,
        tools,
    }
}

fn core_plus(extras: &[ToolId]) -> ToolSelection {
    let mut ids = CORE_TOOLS.to_vec();
    for id in extras {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ToolSelection::Only(ids)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pa_eq;
    use test_case::test_case;

    #[test]
    fn core_has_19_tools_ending_with_expand() {
        pa_eq!(CORE_TOOLS.len(), 19);
        pa_eq!(CORE_TOOLS.last(), Some(&ToolId::ExpandToolset));
    }

    #[test_case(PresetName::Core, 19 ; "core")]
    #[test_case(PresetName::Review, 25 ; "review")]
    #[test_case(PresetName::Refactor, 28 ; "refactor")]
    #[test_case(PresetName::Federation, 33 ; "federation")]
    #[test_case(PresetName::Docs, 25 ; "docs")]
    #[test_case(PresetName::Ops, 31 ; "ops")]
    fn preset_sizes(name: PresetName, expected: usize) {
        match get_preset(name).tools {
            ToolSelection::Only(ids) => pa_eq!(ids.len(), expected),
            ToolSelection::All => panic!("{name} should not be a wildcard"),
        }
    }

    #[test]
    fn full_is_wildcard() {
        pa_eq!(get_preset(PresetName::Full).tools, ToolSelection::All);
        assert!(ToolSelection::All.contains("anything"));
    }

    #[test]
    fn every_preset_contains_core() {
        for name in PresetName::ALL {
            let def = get_preset(name);
            for id in CORE_TOOLS {
                assert!(def.tools.contains(id.name()), "{name} is missing {id}");
            }
        }
    }

    #[test]
    fn multi_repo_tools_only_in_full() {
        for name in PresetName::ALL {
            let def = get_preset(name);
            pa_eq!(def.tools.contains("switchRepo"), name == PresetName::Full);
        }
    }

    #[test]
    fn descriptions_are_non_empty() {
        for name in PresetName::ALL {
            assert!(!get_preset(name).description.is_empty());
        }
    }
}
