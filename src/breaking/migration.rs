use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    breaking::{DetectedChange, MigrationStrategy, VersionUpgradeAnalysis},
    common::path::{get_path, remove_path, set_path},
    model::NodeModel,
};

/// Record of one strategy executed against a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub property_name: String,
    pub strategy: MigrationStrategy,
    /// Whether the node's parameters actually changed.
    pub changed: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub node: NodeModel,
    pub applied: Vec<AppliedMigration>,
    /// Breaking changes left for a person to handle.
    pub remaining: Vec<DetectedChange>,
    /// No manual change remains.
    pub success: bool,
    pub guidance: Vec<String>,
}

/// Execute the strategy of `change` against `node`'s parameters.
///
/// Returns `None` when the change carries no strategy; such changes stay
/// with the caller as manual work.
pub fn apply_migration(
    node: &mut NodeModel,
    change: &DetectedChange,
) -> Option<AppliedMigration> {
    let strategy = change.migration_strategy.as_ref()?;
    let params = &mut node.parameters;

    let (changed, description) = match strategy {
        MigrationStrategy::AddProperty { path, default_value } => {
            if get_path(params, path).is_some() {
                (false, format!("kept existing '{}'", path))
            } else {
                (set_path(params, path, default_value.clone()), format!("added '{}' with its default", path))
            }
        }
        MigrationStrategy::RemoveProperty { path } => match remove_path(params, path) {
            Some(_) => (true, format!("removed '{}'", path)),
            None => (false, format!("'{}' was not set", path)),
        },
        MigrationStrategy::RenameProperty { source_path, target_path } => match remove_path(params, source_path) {
            Some(value) => {
                if set_path(params, target_path, value.clone()) {
                    (true, format!("moved '{}' to '{}'", source_path, target_path))
                } else {
                    // restore, the target cannot hold a value
                    set_path(params, source_path, value);
                    (false, format!("could not move '{}' to '{}'", source_path, target_path))
                }
            }
            None => (false, format!("'{}' was not set", source_path)),
        },
        MigrationStrategy::SetDefault { path, default_value } => {
            if get_path(params, path).is_none() {
                (set_path(params, path, default_value.clone()), format!("defaulted '{}'", path))
            } else {
                (false, format!("kept existing '{}'", path))
            }
        }
    };
    debug!("breaking::apply_migration({}) {}", node.name, description);

    Some(AppliedMigration {
        property_name: change.property_name.clone(),
        strategy: strategy.clone(),
        changed,
        description,
    })
}

/// Migrate a copy of `node` to `analysis.to_version`, applying every change
/// that carries a strategy.
pub fn migrate_node(
    node: &NodeModel,
    analysis: &VersionUpgradeAnalysis,
) -> MigrationResult {
    let mut migrated = node.clone();
    let mut applied = Vec::new();
    let mut remaining = Vec::new();

    for change in analysis.changes.iter() {
        match apply_migration(&mut migrated, change) {
            Some(migration) => applied.push(migration),
            None if change.is_breaking => remaining.push(change.clone()),
            None => {}
        }
    }
    migrated.type_version = analysis.to_version.as_f64();

    let mut guidance = Vec::new();
    if !remaining.is_empty() {
        guidance.push(format!("'{}' was upgraded to version {} but needs manual review:", node.name, analysis.to_version));
        guidance.extend(remaining.iter().map(|c| format!("- {}: {}", c.property_name, c.migration_hint)));
        guidance.push("Test the workflow after making these changes".to_string());
    }

    MigrationResult {
        node: migrated,
        applied,
        success: remaining.is_empty(),
        remaining,
        guidance,
    }
}
