use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    breaking::{BreakingChangeRegistry, DetectedChange, Severity, detect_schema_changes},
    catalog::{NodeCatalog, normalize_node_type},
    common::Version,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionUpgradeAnalysis {
    pub node_type: String,
    pub from_version: Version,
    pub to_version: Version,
    pub has_breaking_changes: bool,
    /// Most severe first; registry entries before schema-derived ones on ties.
    pub changes: Vec<DetectedChange>,
    pub auto_migratable_count: usize,
    pub manual_required_count: usize,
    pub overall_severity: Severity,
    pub recommendations: Vec<String>,
}

impl VersionUpgradeAnalysis {
    pub fn breaking_changes(&self) -> impl Iterator<Item = &DetectedChange> {
        self.changes.iter().filter(|c| c.is_breaking)
    }

    /// Breaking changes that no strategy covers.
    pub fn manual_changes(&self) -> impl Iterator<Item = &DetectedChange> {
        self.changes.iter().filter(|c| c.needs_manual_action())
    }
}

/// Detects what changes between two versions of a node type.
///
/// The analyzer only reads its registry and catalog; every call is a pure
/// function of `(node type, from, to)`.
#[derive(Clone)]
pub struct BreakingChangeAnalyzer {
    registry: Arc<BreakingChangeRegistry>,
    catalog: Arc<dyn NodeCatalog>,
}

impl BreakingChangeAnalyzer {
    pub fn new(
        registry: Arc<BreakingChangeRegistry>,
        catalog: Arc<dyn NodeCatalog>,
    ) -> Self {
        Self { registry, catalog }
    }

    pub fn registry(&self) -> &BreakingChangeRegistry {
        &self.registry
    }

    pub fn analyze_version_upgrade(
        &self,
        node_type: &str,
        from: &Version,
        to: &Version,
    ) -> VersionUpgradeAnalysis {
        let node_type = normalize_node_type(node_type);

        let mut changes: Vec<DetectedChange> = self.registry.changes_for(&node_type, from, to).into_iter().map(DetectedChange::from).collect();
        let registry_count = changes.len();

        if from < to
            && let (Some(old), Some(new)) = (self.catalog.property_schema(&node_type, from), self.catalog.property_schema(&node_type, to))
        {
            let mut seen: HashSet<String> = changes.iter().map(|c| c.property_name.clone()).collect();
            for change in detect_schema_changes(&old, &new) {
                if seen.insert(change.property_name.clone()) {
                    changes.push(change);
                }
            }
        }
        debug!(
            "breaking::analyze_version_upgrade({}, {} -> {}) registry={} dynamic={}",
            node_type,
            from,
            to,
            registry_count,
            changes.len() - registry_count
        );

        // stable: keeps registry-first order within one severity
        changes.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| b.is_breaking.cmp(&a.is_breaking)));

        let auto_migratable_count = changes.iter().filter(|c| c.is_breaking && c.auto_migratable).count();
        let manual_required_count = changes.iter().filter(|c| c.needs_manual_action()).count();
        let overall_severity = changes.iter().map(|c| c.severity).max().unwrap_or_default();
        let has_breaking_changes = changes.iter().any(|c| c.is_breaking);

        let mut analysis = VersionUpgradeAnalysis {
            node_type,
            from_version: from.clone(),
            to_version: to.clone(),
            has_breaking_changes,
            changes,
            auto_migratable_count,
            manual_required_count,
            overall_severity,
            recommendations: Vec::new(),
        };
        analysis.recommendations = recommendations(&analysis);
        analysis
    }

    /// Registry-only check, without consulting property schemas.
    pub fn has_breaking_changes(
        &self,
        node_type: &str,
        from: &Version,
        to: &Version,
    ) -> bool {
        self.registry.has_breaking_changes(node_type, from, to)
    }

    pub fn changed_properties(
        &self,
        node_type: &str,
        from: &Version,
        to: &Version,
    ) -> Vec<String> {
        self.registry.changed_properties(node_type, from, to)
    }
}

fn recommendations(analysis: &VersionUpgradeAnalysis) -> Vec<String> {
    let mut out = Vec::new();
    if analysis.changes.is_empty() {
        out.push(format!("No changes detected between {} and {}", analysis.from_version, analysis.to_version));
        return out;
    }

    let breaking = analysis.breaking_changes().count();
    if breaking == 0 {
        out.push(format!("No breaking changes; upgrading {} to {} is safe", analysis.node_type, analysis.to_version));
    } else {
        out.push(format!("{} breaking changes detected, {} auto-migratable", breaking, analysis.auto_migratable_count));
        if analysis.manual_required_count == 0 {
            out.push("All breaking changes can be migrated automatically".to_string());
        } else {
            out.push(format!("{} changes need manual review after upgrading", analysis.manual_required_count));
            out.extend(analysis.manual_changes().map(|c| format!("Manual action for '{}': {}", c.property_name, c.migration_hint)));
        }
    }

    let informational = analysis.changes.len() - breaking;
    if informational > 0 {
        out.push(format!("{} non-breaking changes, e.g. new optional properties", informational));
    }
    out
}
