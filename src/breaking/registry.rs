use std::collections::BTreeSet;

use crate::{
    FlowmendError, Result,
    breaking::BreakingChange,
    catalog::normalize_node_type,
    common::Version,
};

/// Registry node type matching every node type.
pub const WILDCARD: &str = "*";

const BUILTIN_REGISTRY: &str = include_str!("registry.json");

/// Immutable table of known breaking changes.
#[derive(Debug, Clone, Default)]
pub struct BreakingChangeRegistry {
    entries: Vec<BreakingChange>,
}

impl BreakingChangeRegistry {
    /// The registry shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_REGISTRY)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let entries = serde_json::from_str::<Vec<BreakingChange>>(s).map_err(|e| FlowmendError::Registry(format!("invalid breaking change registry: {}", e)))?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<BreakingChange>) -> Result<Self> {
        let mut entries = entries;
        for entry in entries.iter_mut() {
            if entry.auto_migratable && entry.migration_strategy.is_none() {
                return Err(FlowmendError::Registry(format!(
                    "{} {} -> {} '{}' is marked auto-migratable without a migration strategy",
                    entry.node_type, entry.from_version, entry.to_version, entry.property_name
                )));
            }
            if entry.from_version >= entry.to_version {
                return Err(FlowmendError::Registry(format!(
                    "{} '{}' has an empty version span {} -> {}",
                    entry.node_type, entry.property_name, entry.from_version, entry.to_version
                )));
            }
            if entry.node_type != WILDCARD {
                entry.node_type = normalize_node_type(&entry.node_type);
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for `node_type` (or the wildcard) whose span overlaps
    /// `from -> to`, ordered by their starting version.
    pub fn changes_for(
        &self,
        node_type: &str,
        from: &Version,
        to: &Version,
    ) -> Vec<&BreakingChange> {
        if from >= to {
            return Vec::new();
        }
        let node_type = normalize_node_type(node_type);
        let mut changes: Vec<&BreakingChange> = self
            .entries
            .iter()
            .filter(|e| e.node_type == WILDCARD || e.node_type == node_type)
            .filter(|e| e.from_version < *to && e.to_version > *from)
            .collect();
        changes.sort_by(|a, b| a.from_version.cmp(&b.from_version));
        changes
    }

    /// Whether the upgrade crosses any breaking registry entry.
    pub fn has_breaking_changes(
        &self,
        node_type: &str,
        from: &Version,
        to: &Version,
    ) -> bool {
        self.changes_for(node_type, from, to).iter().any(|c| c.is_breaking)
    }

    /// Property names the registry knows to change on the upgrade.
    pub fn changed_properties(
        &self,
        node_type: &str,
        from: &Version,
        to: &Version,
    ) -> Vec<String> {
        let names: BTreeSet<&str> = self.changes_for(node_type, from, to).into_iter().map(|c| c.property_name.as_str()).collect();
        names.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::breaking::{ChangeType, Severity};

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_builtin_registry() {
        let registry = BreakingChangeRegistry::builtin().unwrap();
        assert!(registry.len() >= 10);

        let changes = registry.changes_for("webhook", &v("1.0"), &v("2.1"));
        assert_eq!(changes.len(), 3);
        assert_eq!(changes.iter().filter(|c| c.auto_migratable).count(), 2);
        assert!(registry.has_breaking_changes("n8n-nodes-base.webhook", &v("2"), &v("2.1")));
    }

    #[test]
    fn test_span_overlap_is_strict() {
        let registry = BreakingChangeRegistry::builtin().unwrap();
        assert!(registry.changes_for("webhook", &v("2.0"), &v("2.0")).is_empty());
        assert!(registry.changes_for("webhook", &v("2.1"), &v("2.1")).is_empty());
        assert_eq!(registry.changes_for("webhook", &v("2.0"), &v("2.1")).len(), 1);
        assert!(registry.changes_for("webhook", &v("2.1"), &v("1.0")).is_empty());
    }

    #[test]
    fn test_changed_properties() {
        let registry = BreakingChangeRegistry::builtin().unwrap();
        assert_eq!(registry.changed_properties("httpRequest", &v("3"), &v("4.2")), vec!["authentication".to_string(), "queryParametersUi".to_string()]);
        assert!(!registry.has_breaking_changes("code", &v("1"), &v("2")));
    }

    #[test]
    fn test_wildcard_entries() {
        let registry = BreakingChangeRegistry::from_json(
            &json!([{
                "nodeType": "*",
                "fromVersion": "1",
                "toVersion": "2",
                "propertyName": "notesInFlow",
                "changeType": "removed",
                "isBreaking": false,
                "migrationHint": "dropped",
                "severity": "LOW"
            }])
            .to_string(),
        )
        .unwrap();
        let changes = registry.changes_for("slack", &v("1"), &v("2.3"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Removed);
        assert_eq!(changes[0].severity, Severity::Low);
    }

    #[test]
    fn test_rejects_auto_migratable_without_strategy() {
        let raw = json!([{
            "nodeType": "set",
            "fromVersion": "1",
            "toVersion": "2",
            "propertyName": "x",
            "changeType": "removed",
            "isBreaking": true,
            "migrationHint": "",
            "autoMigratable": true,
            "severity": "HIGH"
        }]);
        let err = BreakingChangeRegistry::from_json(&raw.to_string()).unwrap_err();
        assert!(matches!(err, FlowmendError::Registry(_)));
    }
}
