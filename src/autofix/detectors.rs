//! Node-local fix detection.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::{
    autofix::{Confidence, FixOperation, FixType},
    breaking::{BreakingChangeAnalyzer, migrate_node},
    catalog::{NodeCatalog, is_webhook_node, suggest_node_types},
    common::path::{self, get_path},
    model::{MAIN, NodeModel, WorkflowModel},
    utils,
};

/// Format: `{{ expression }}`
const EXPRESSION_PATTERN: &str = r"\{\{[\s\S]*?\}\}";

static EXPRESSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(EXPRESSION_PATTERN).unwrap());

fn fix(
    node: &NodeModel,
    field: impl Into<String>,
    fix_type: FixType,
    before: Value,
    after: Value,
    confidence: Confidence,
    description: String,
) -> FixOperation {
    FixOperation {
        node: node.name.clone(),
        node_id: node.id.clone(),
        field: field.into(),
        fix_type,
        before,
        after,
        confidence,
        description,
        extra_updates: Map::new(),
    }
}

/// Strings holding `{{ ... }}` without the leading `=` that makes them
/// evaluate.
pub fn expression_fixes(node: &NodeModel) -> Vec<FixOperation> {
    let mut found = Vec::new();
    collect_expressions(&node.parameters, "parameters", &mut found);
    found
        .into_iter()
        .map(|(field, text)| {
            let description = format!("'{}' contains an expression but is missing the '=' prefix", field);
            fix(node, field, FixType::ExpressionFormat, json!(text), json!(format!("={}", text)), Confidence::High, description)
        })
        .collect()
}

fn collect_expressions(
    value: &Value,
    at: &str,
    found: &mut Vec<(String, String)>,
) {
    match value {
        Value::String(s) if !s.starts_with('=') && EXPRESSION_RE.is_match(s) => found.push((at.to_string(), s.clone())),
        Value::Object(map) => {
            for (key, child) in map {
                collect_expressions(child, &path::join(at, key), found);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_expressions(child, &path::join(at, &i.to_string()), found);
            }
        }
        _ => {}
    }
}

/// A declared version above anything the node type supports.
pub fn typeversion_correction(
    catalog: &dyn NodeCatalog,
    node: &NodeModel,
) -> Option<FixOperation> {
    let latest = catalog.latest_version(&node.node_type)?;
    if node.version() <= latest {
        return None;
    }
    Some(fix(
        node,
        "typeVersion",
        FixType::TypeversionCorrection,
        json!(node.type_version),
        json!(latest.as_f64()),
        Confidence::Medium,
        format!("typeVersion {} exceeds the latest supported version {}", node.type_version, latest),
    ))
}

/// `onError = continueErrorOutput` with nothing attached to the error output.
pub fn error_output_fix(
    workflow: &WorkflowModel,
    node: &NodeModel,
) -> Option<FixOperation> {
    if !node.routes_errors() {
        return None;
    }
    if workflow.connections.has_output(&node.name, MAIN, 1) {
        return None;
    }
    Some(fix(
        node,
        "onError",
        FixType::ErrorOutputConfig,
        json!(node.on_error),
        Value::Null,
        Confidence::Medium,
        format!("'{}' routes errors to an error output that has no connection", node.name),
    ))
}

/// An unknown node type close enough to a catalog entry.
pub fn node_type_fix(
    catalog: &dyn NodeCatalog,
    node: &NodeModel,
    similarity_threshold: u32,
) -> Option<FixOperation> {
    if catalog.lookup(&node.node_type).is_some() {
        return None;
    }
    let best = suggest_node_types(catalog, &node.node_type, 1).into_iter().next()?;
    if !best.score.is_pattern_match() && best.score.total < similarity_threshold {
        return None;
    }
    Some(fix(
        node,
        "type",
        FixType::NodeTypeCorrection,
        json!(node.node_type),
        json!(best.node_type),
        Confidence::High,
        format!("unknown node type '{}', did you mean '{}' ({})", node.node_type, best.node_type, best.score.reasons().join(", ")),
    ))
}

/// A webhook without a path gets a fresh unique one.
pub fn webhook_path_fix(
    catalog: &dyn NodeCatalog,
    node: &NodeModel,
) -> Option<FixOperation> {
    if !is_webhook_node(catalog, node) {
        return None;
    }
    let has_path = get_path(&node.parameters, "path").and_then(Value::as_str).is_some_and(|p| !p.trim().is_empty());
    if has_path {
        return None;
    }
    let id = utils::new_uuid();
    let mut webhook_fix = fix(
        node,
        "parameters.path",
        FixType::WebhookMissingPath,
        get_path(&node.parameters, "path").cloned().unwrap_or(Value::Null),
        json!(id),
        Confidence::High,
        format!("webhook '{}' has no path", node.name),
    );
    if node.webhook_id.is_none() {
        webhook_fix.extra_updates.insert("webhookId".into(), json!(id));
    }
    Some(webhook_fix)
}

/// Upgrade an outdated node to the latest version, carrying the migrated
/// parameters. Returns the fix and any manual guidance.
pub fn version_fix(
    catalog: &dyn NodeCatalog,
    analyzer: &BreakingChangeAnalyzer,
    node: &NodeModel,
) -> Option<(FixOperation, Vec<String>)> {
    let latest = catalog.latest_version(&node.node_type)?;
    let current = node.version();
    if current >= latest {
        return None;
    }

    let analysis = analyzer.analyze_version_upgrade(&node.node_type, &current, &latest);
    let migration = migrate_node(node, &analysis);

    let (fix_type, confidence) = match (analysis.has_breaking_changes, analysis.manual_required_count, analysis.auto_migratable_count) {
        (false, _, _) => (FixType::TypeversionUpgrade, Confidence::High),
        (true, 0, _) => (FixType::TypeversionUpgrade, Confidence::Medium),
        (true, _, 0) => (FixType::VersionMigration, Confidence::Low),
        (true, _, _) => (FixType::VersionMigration, Confidence::Medium),
    };
    let description = match fix_type {
        FixType::VersionMigration => format!(
            "upgrade '{}' from {} to {}: {} of {} breaking changes migrate automatically",
            node.name,
            current,
            latest,
            analysis.auto_migratable_count,
            analysis.breaking_changes().count()
        ),
        _ => format!("upgrade '{}' from {} to {}", node.name, current, latest),
    };

    let mut upgrade = fix(node, "typeVersion", fix_type, json!(node.type_version), json!(latest.as_f64()), confidence, description);
    if migration.node.parameters != node.parameters {
        upgrade.extra_updates.insert("parameters".into(), migration.node.parameters);
    }
    Some((upgrade, migration.guidance))
}
