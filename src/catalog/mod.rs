//! Read-only reference data about node types.
//!
//! The catalog answers which node types exist, their latest version, and the
//! property schema of each version. It is consulted, never mutated, by the
//! breaking-change analyzer and the autofix engine.

mod similarity;
mod static_catalog;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{common::Version, model::NodeModel};

pub use similarity::{NodeSuggestion, SimilarityScore, score_candidate, suggest_node_types};
pub use static_catalog::StaticCatalog;

/// Package prefix of the built-in node set.
pub const BASE_PACKAGE: &str = "n8n-nodes-base";
/// Package prefix of the LangChain node set.
pub const LANGCHAIN_PACKAGE: &str = "@n8n/n8n-nodes-langchain";

/// One property of a node type's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Child properties of `collection` / `fixedCollection` properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PropertySchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeInfo {
    pub node_type: String,
    #[serde(default)]
    pub display_name: String,
    pub latest_version: Version,
    #[serde(default)]
    pub trigger: bool,
    /// Whether the trigger can activate a workflow on its own.
    #[serde(default)]
    pub activatable: bool,
    /// Whether the node listens on a webhook path.
    #[serde(default)]
    pub webhook: bool,
    /// Property schema per version where it changed.
    #[serde(default)]
    pub versions: BTreeMap<String, Vec<PropertySchema>>,
}

impl NodeTypeInfo {
    /// The schema in effect at `version`: the one registered for the greatest
    /// schema version not above it.
    pub fn schema_for(
        &self,
        version: &Version,
    ) -> Option<&Vec<PropertySchema>> {
        self.versions
            .iter()
            .filter_map(|(v, schema)| v.parse::<Version>().ok().map(|v| (v, schema)))
            .filter(|(v, _)| v <= version)
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, schema)| schema)
    }
}

/// Lookup of node type reference data.
pub trait NodeCatalog: Send + Sync {
    /// Look up a node type. Short forms (`webhook`, `nodes-base.webhook`)
    /// resolve to their package-qualified entry.
    fn lookup(
        &self,
        node_type: &str,
    ) -> Option<&NodeTypeInfo>;

    /// All package-qualified node types in the catalog.
    fn node_types(&self) -> Vec<String>;

    fn latest_version(
        &self,
        node_type: &str,
    ) -> Option<Version> {
        self.lookup(node_type).map(|info| info.latest_version.clone())
    }

    fn property_schema(
        &self,
        node_type: &str,
        version: &Version,
    ) -> Option<Vec<PropertySchema>> {
        self.lookup(node_type).and_then(|info| info.schema_for(version).cloned())
    }
}

/// Package-qualify a node type identifier.
pub fn normalize_node_type(node_type: &str) -> String {
    let node_type = node_type.trim();
    if let Some(rest) = node_type.strip_prefix("nodes-base.") {
        return format!("{}.{}", BASE_PACKAGE, rest);
    }
    if let Some(rest) = node_type.strip_prefix("nodes-langchain.") {
        return format!("{}.{}", LANGCHAIN_PACKAGE, rest);
    }
    if node_type.contains('.') {
        return node_type.to_string();
    }
    format!("{}.{}", BASE_PACKAGE, node_type)
}

/// The part of a node type after its package, e.g. `webhook`.
pub fn base_name(node_type: &str) -> &str {
    node_type.rsplit('.').next().unwrap_or(node_type)
}

/// Whether an enabled node of this type can activate a workflow.
pub fn is_activatable_trigger(
    catalog: &dyn NodeCatalog,
    node: &NodeModel,
) -> bool {
    if node.disabled {
        return false;
    }
    if let Some(info) = catalog.lookup(&node.node_type) {
        return info.activatable;
    }
    let base = base_name(&node.node_type);
    base == "webhook" || (base.ends_with("Trigger") && base != "manualTrigger" && base != "executeWorkflowTrigger")
}

/// Whether the node is webhook-shaped and needs a path.
pub fn is_webhook_node(
    catalog: &dyn NodeCatalog,
    node: &NodeModel,
) -> bool {
    match catalog.lookup(&node.node_type) {
        Some(info) => info.webhook,
        None => base_name(&node.node_type) == "webhook",
    }
}
