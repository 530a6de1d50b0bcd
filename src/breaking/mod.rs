//! Version-to-version change detection for node types.
//!
//! Changes come from two sources: a curated [`BreakingChangeRegistry`] and a
//! structural diff of the property schemas the catalog holds for each
//! version. The [`BreakingChangeAnalyzer`] merges both; the migration
//! functions apply the mechanical part of the result to a node.

mod analyzer;
mod migration;
mod registry;
mod schema;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::Version;

pub use analyzer::{BreakingChangeAnalyzer, VersionUpgradeAnalysis};
pub use migration::{AppliedMigration, MigrationResult, apply_migration, migrate_node};
pub use registry::{BreakingChangeRegistry, WILDCARD};
pub use schema::{detect_schema_changes, flatten_schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Renamed,
    TypeChanged,
    RequirementChanged,
    DefaultChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

/// Where a detected change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeSource {
    Registry,
    Dynamic,
}

/// Mechanical migration of one property. Paths are dotted and relative to
/// the node's `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MigrationStrategy {
    /// Set `path` to `default_value` unless something is already there.
    AddProperty { path: String, default_value: Value },
    /// Delete `path` if present.
    RemoveProperty { path: String },
    /// Move the value at `source_path` to `target_path`.
    RenameProperty { source_path: String, target_path: String },
    /// Set `path` to `default_value` only when it is undefined or null.
    SetDefault { path: String, default_value: Value },
}

/// A registry record: one property-level change between two versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakingChange {
    /// Package-qualified node type, or `*` for every type.
    pub node_type: String,
    pub from_version: Version,
    pub to_version: Version,
    pub property_name: String,
    pub change_type: ChangeType,
    pub is_breaking: bool,
    pub migration_hint: String,
    #[serde(default)]
    pub auto_migratable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_strategy: Option<MigrationStrategy>,
    pub severity: Severity,
}

/// A change found for one analysis, from either source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedChange {
    pub property_name: String,
    pub change_type: ChangeType,
    pub is_breaking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    pub migration_hint: String,
    pub auto_migratable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_strategy: Option<MigrationStrategy>,
    pub severity: Severity,
    pub source: ChangeSource,
}

impl DetectedChange {
    /// A breaking change nothing can migrate; a person has to act on it.
    pub fn needs_manual_action(&self) -> bool {
        self.is_breaking && self.migration_strategy.is_none()
    }
}

impl From<&BreakingChange> for DetectedChange {
    fn from(change: &BreakingChange) -> Self {
        Self {
            property_name: change.property_name.clone(),
            change_type: change.change_type,
            is_breaking: change.is_breaking,
            old_value: None,
            new_value: None,
            migration_hint: change.migration_hint.clone(),
            auto_migratable: change.auto_migratable && change.migration_strategy.is_some(),
            migration_strategy: change.migration_strategy.clone(),
            severity: change.severity,
            source: ChangeSource::Registry,
        }
    }
}
