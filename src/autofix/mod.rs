//! Confidence-ranked fix proposals for a workflow, optionally applied
//! through the diff engine.

mod detectors;
mod engine;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    diff::{DiffOperation, DiffResult, NodeRef},
    model::WorkflowModel,
};

pub use engine::{AutofixEngine, select_fixes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FixType {
    ExpressionFormat,
    TypeversionCorrection,
    ErrorOutputConfig,
    NodeTypeCorrection,
    WebhookMissingPath,
    TypeversionUpgrade,
    VersionMigration,
}

impl FixType {
    pub const ALL: [FixType; 7] = [
        FixType::ExpressionFormat,
        FixType::TypeversionCorrection,
        FixType::ErrorOutputConfig,
        FixType::NodeTypeCorrection,
        FixType::WebhookMissingPath,
        FixType::TypeversionUpgrade,
        FixType::VersionMigration,
    ];
}

/// How safe a fix is to apply without review. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

/// A proposed change to one field of one node. Never applied by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOperation {
    pub node: String,
    pub node_id: String,
    /// Dotted path relative to the node, e.g. `parameters.url` or `typeVersion`.
    pub field: String,
    #[serde(rename = "type")]
    pub fix_type: FixType,
    pub before: Value,
    pub after: Value,
    pub confidence: Confidence,
    pub description: String,
    /// Further paths written together with `field`, such as migrated
    /// parameters accompanying a version bump.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_updates: Map<String, Value>,
}

impl FixOperation {
    /// The `updateNode` operation that carries out this fix.
    pub fn to_operation(&self) -> DiffOperation {
        let mut updates = Map::new();
        updates.insert(self.field.clone(), self.after.clone());
        for (path, value) in self.extra_updates.iter() {
            updates.insert(path.clone(), value.clone());
        }
        DiffOperation::UpdateNode {
            target: NodeRef::id(self.node_id.clone()),
            updates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofixConfig {
    /// Fix kinds to generate; all when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_types: Option<Vec<FixType>>,
    #[serde(default)]
    pub confidence_threshold: Confidence,
    #[serde(default = "default_max_fixes")]
    pub max_fixes: usize,
    #[serde(default)]
    pub apply_fixes: bool,
    /// Minimum similarity score for a node type suggestion.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: u32,
}

fn default_max_fixes() -> usize {
    50
}

fn default_similarity_threshold() -> u32 {
    70
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            fix_types: None,
            confidence_threshold: Confidence::default(),
            max_fixes: default_max_fixes(),
            apply_fixes: false,
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl AutofixConfig {
    pub fn wants(
        &self,
        fix_type: FixType,
    ) -> bool {
        self.fix_types.as_ref().is_none_or(|types| types.contains(&fix_type))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofixStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<String, usize>,
}

impl AutofixStats {
    pub fn from_fixes(fixes: &[FixOperation]) -> Self {
        let mut stats = Self {
            total: fixes.len(),
            ..Default::default()
        };
        for fix in fixes {
            *stats.by_type.entry(fix.fix_type.to_string()).or_default() += 1;
            *stats.by_confidence.entry(fix.confidence.to_string()).or_default() += 1;
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofixResult {
    pub fixes: Vec<FixOperation>,
    pub stats: AutofixStats,
    pub summary: String,
    /// One `updateNode` per fix, in fix order.
    pub operations: Vec<DiffOperation>,
    /// Manual steps left by version migrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidance: Vec<String>,
    /// The fixed workflow, when fixes were applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_result: Option<DiffResult>,
}

impl AutofixResult {
    /// Whether fixes were applied and changed the workflow.
    pub fn applied(&self) -> bool {
        self.diff_result.as_ref().is_some_and(|r| r.has_changes())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(FixType::TypeversionUpgrade.to_string(), "typeversion-upgrade");
        assert_eq!("node-type-correction".parse::<FixType>().unwrap(), FixType::NodeTypeCorrection);
        assert_eq!(serde_json::to_value(Confidence::High).unwrap(), json!("high"));
        assert!(Confidence::High > Confidence::Medium && Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn test_config_from_json() {
        let config: AutofixConfig = serde_json::from_value(json!({"fixTypes": ["expression-format"], "confidenceThreshold": "high"})).unwrap();
        assert!(config.wants(FixType::ExpressionFormat));
        assert!(!config.wants(FixType::WebhookMissingPath));
        assert_eq!(config.max_fixes, 50);
        assert!(AutofixConfig::default().wants(FixType::VersionMigration));
    }

    #[test]
    fn test_to_operation() {
        let mut extra = Map::new();
        extra.insert("parameters".into(), json!({"a": 1}));
        let fix = FixOperation {
            node: "Hook".into(),
            node_id: "h1".into(),
            field: "typeVersion".into(),
            fix_type: FixType::TypeversionUpgrade,
            before: json!(1),
            after: json!(2.1),
            confidence: Confidence::High,
            description: String::new(),
            extra_updates: extra,
        };
        match fix.to_operation() {
            DiffOperation::UpdateNode { target, updates } => {
                assert_eq!(target, NodeRef::id("h1"));
                assert_eq!(updates["typeVersion"], json!(2.1));
                assert_eq!(updates["parameters"], json!({"a": 1}));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stats() {
        let fix = |fix_type, confidence| FixOperation {
            node: "n".into(),
            node_id: "1".into(),
            field: "f".into(),
            fix_type,
            before: Value::Null,
            after: Value::Null,
            confidence,
            description: String::new(),
            extra_updates: Map::new(),
        };
        let stats = AutofixStats::from_fixes(&[
            fix(FixType::ExpressionFormat, Confidence::High),
            fix(FixType::ExpressionFormat, Confidence::High),
            fix(FixType::VersionMigration, Confidence::Low),
        ]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type["expression-format"], 2);
        assert_eq!(stats.by_confidence["low"], 1);
    }
}
