use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    autofix::{AutofixConfig, AutofixResult, AutofixStats, Confidence, FixOperation, FixType, detectors},
    breaking::BreakingChangeAnalyzer,
    catalog::NodeCatalog,
    common::path::set_path,
    diff::{DiffEngine, DiffRequest},
    model::{NodeModel, WorkflowModel},
};

/// Keep fixes at or above `threshold`, most confident first (detection
/// order within one tier), at most `max_fixes` of them.
pub fn select_fixes(
    mut fixes: Vec<FixOperation>,
    threshold: Confidence,
    max_fixes: usize,
) -> Vec<FixOperation> {
    fixes.retain(|f| f.confidence >= threshold);
    fixes.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    fixes.truncate(max_fixes);
    fixes
}

/// Apply a fix to a scratch copy of its node so later detectors see it.
fn preview(
    node: &mut NodeModel,
    fix: &FixOperation,
) {
    let Ok(mut doc) = serde_json::to_value(&*node) else {
        return;
    };
    let mut ok = set_path(&mut doc, &fix.field, fix.after.clone());
    for (path, value) in fix.extra_updates.iter() {
        ok &= set_path(&mut doc, path, value.clone());
    }
    if ok && let Ok(updated) = serde_json::from_value::<NodeModel>(doc) {
        *node = updated;
    }
}

pub struct AutofixEngine {
    catalog: Arc<dyn NodeCatalog>,
    analyzer: BreakingChangeAnalyzer,
    diff: Arc<DiffEngine>,
}

impl AutofixEngine {
    pub fn new(
        catalog: Arc<dyn NodeCatalog>,
        analyzer: BreakingChangeAnalyzer,
        diff: Arc<DiffEngine>,
    ) -> Self {
        Self { catalog, analyzer, diff }
    }

    /// Propose fixes for `workflow` and, when `config.apply_fixes` is set,
    /// apply them as one best-effort diff batch.
    pub fn generate_fixes(
        &self,
        workflow: &WorkflowModel,
        config: &AutofixConfig,
    ) -> AutofixResult {
        let catalog = self.catalog.as_ref();
        let mut fixes: Vec<FixOperation> = Vec::new();
        let mut scratch = workflow.nodes.clone();

        for (node, preview_node) in workflow.nodes.iter().zip(scratch.iter_mut()) {
            let mut found = Vec::new();
            if config.wants(FixType::ExpressionFormat) {
                found.extend(detectors::expression_fixes(node));
            }
            if config.wants(FixType::TypeversionCorrection) {
                found.extend(detectors::typeversion_correction(catalog, node));
            }
            if config.wants(FixType::ErrorOutputConfig) {
                found.extend(detectors::error_output_fix(workflow, node));
            }
            if config.wants(FixType::NodeTypeCorrection) {
                found.extend(detectors::node_type_fix(catalog, node, config.similarity_threshold));
            }
            if config.wants(FixType::WebhookMissingPath) {
                found.extend(detectors::webhook_path_fix(catalog, node));
            }
            for fix in found.iter() {
                preview(preview_node, fix);
            }
            fixes.extend(found);
        }

        // version upgrades see the nodes as the fixes above leave them
        let mut guidance: Vec<(String, Vec<String>)> = Vec::new();
        for node in scratch.iter() {
            if let Some((fix, lines)) = detectors::version_fix(catalog, &self.analyzer, node)
                && config.wants(fix.fix_type)
            {
                if !lines.is_empty() {
                    guidance.push((fix.node_id.clone(), lines));
                }
                fixes.push(fix);
            }
        }
        let detected = fixes.len();

        let fixes = select_fixes(fixes, config.confidence_threshold, config.max_fixes);
        let guidance = guidance
            .into_iter()
            .filter(|(id, _)| fixes.iter().any(|f| f.node_id == *id && f.fix_type == FixType::VersionMigration))
            .flat_map(|(_, lines)| lines)
            .collect();
        let operations = fixes.iter().map(FixOperation::to_operation).collect::<Vec<_>>();
        debug!("autofix::generate_fixes({}) detected={} selected={}", workflow.name, detected, fixes.len());

        let mut result = AutofixResult {
            stats: AutofixStats::from_fixes(&fixes),
            fixes,
            operations,
            guidance,
            ..Default::default()
        };

        if config.apply_fixes {
            if result.operations.is_empty() {
                result.workflow = Some(workflow.clone());
            } else {
                let diff = self.diff.apply_diff(workflow, &DiffRequest::new(result.operations.clone()).continue_on_error(true));
                result.workflow = diff.workflow.clone();
                result.diff_result = Some(diff);
            }
        }
        result.summary = summary(&result);
        info!("autofix::generate_fixes({}) {}", workflow.name, result.summary);
        result
    }
}

fn summary(result: &AutofixResult) -> String {
    if result.fixes.is_empty() {
        return "No fixes found".to_string();
    }
    let count = |c: Confidence| result.stats.by_confidence.get(c.as_ref()).copied().unwrap_or(0);
    let mut text = format!(
        "Found {} fixes ({} high, {} medium, {} low confidence)",
        result.stats.total,
        count(Confidence::High),
        count(Confidence::Medium),
        count(Confidence::Low)
    );
    if let Some(diff) = &result.diff_result {
        text.push_str(&format!(", applied {}, failed {}", diff.operations_applied, diff.operations_failed));
    }
    text
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::{
        breaking::BreakingChangeRegistry,
        catalog::StaticCatalog,
        model::{Connection, ERROR_OUTPUT_MODE},
    };

    fn engine() -> AutofixEngine {
        let catalog: Arc<dyn NodeCatalog> = Arc::new(StaticCatalog::builtin().unwrap());
        let analyzer = BreakingChangeAnalyzer::new(Arc::new(BreakingChangeRegistry::builtin().unwrap()), catalog.clone());
        let diff = Arc::new(DiffEngine::new(catalog.clone()));
        AutofixEngine::new(catalog, analyzer, diff)
    }

    fn workflow() -> WorkflowModel {
        let mut wf = WorkflowModel::new("broken");
        wf.nodes.push(NodeModel::new("h1", "Hook", "n8n-nodes-base.webhook").with_version(1.0).with_parameters(json!({
            "path": "",
            "responseMode": "{{ $json.mode }}",
            "options": {"binaryData": true}
        })));
        let mut call = NodeModel::new("c1", "Call", "n8n-nodes-base.httpRequest").with_version(4.2);
        call.on_error = Some(ERROR_OUTPUT_MODE.to_string());
        wf.nodes.push(call);
        wf.nodes.push(NodeModel::new("s1", "Notify", "n8n-nodes-base.slack").with_version(7.0));
        wf.nodes.push(NodeModel::new("x1", "Typo", "n8n-nodes-base.httpRequst").with_version(4.2));
        wf.connections.add(Connection::main("Hook", 0, "Call"));
        wf
    }

    #[test]
    fn test_detects_each_kind() {
        let config = AutofixConfig {
            confidence_threshold: Confidence::Low,
            ..Default::default()
        };
        let result = engine().generate_fixes(&workflow(), &config);
        for fix_type in [
            FixType::ExpressionFormat,
            FixType::WebhookMissingPath,
            FixType::ErrorOutputConfig,
            FixType::TypeversionCorrection,
            FixType::NodeTypeCorrection,
            FixType::VersionMigration,
        ] {
            assert!(result.fixes.iter().any(|f| f.fix_type == fix_type), "missing {}", fix_type);
        }
        assert_eq!(result.operations.len(), result.fixes.len());
        assert!(result.workflow.is_none());
        assert!(!result.guidance.is_empty());
    }

    #[test]
    fn test_high_threshold() {
        let config = AutofixConfig {
            confidence_threshold: Confidence::High,
            ..Default::default()
        };
        let result = engine().generate_fixes(&workflow(), &config);
        assert!(!result.fixes.is_empty());
        assert!(result.fixes.iter().all(|f| f.confidence == Confidence::High));
        assert_eq!(result.stats.by_confidence.get("medium"), None);
    }

    #[test]
    fn test_fix_type_filter_and_cap() {
        let config = AutofixConfig {
            fix_types: Some(vec![FixType::ExpressionFormat, FixType::WebhookMissingPath]),
            max_fixes: 1,
            ..Default::default()
        };
        let result = engine().generate_fixes(&workflow(), &config);
        assert_eq!(result.fixes.len(), 1);
        assert_eq!(result.fixes[0].fix_type, FixType::ExpressionFormat);
    }

    #[test]
    fn test_apply_fixes() {
        let config = AutofixConfig {
            apply_fixes: true,
            ..Default::default()
        };
        let input = workflow();
        let result = engine().generate_fixes(&input, &config);
        assert!(result.applied());

        let fixed = result.workflow.unwrap();
        let hook = fixed.node_by_name("Hook").unwrap();
        assert_eq!(hook.type_version, 2.1);
        assert_eq!(hook.parameters["responseMode"], json!("={{ $json.mode }}"));
        assert_eq!(hook.parameters["options"], json!({"binaryPropertyName": true}));
        assert!(!hook.parameters["path"].as_str().unwrap().is_empty());
        assert_eq!(fixed.node_by_name("Call").unwrap().on_error, None);
        assert_eq!(fixed.node_by_name("Notify").unwrap().type_version, 2.3);
        assert_eq!(fixed.node_by_name("Typo").unwrap().node_type, "n8n-nodes-base.httpRequest");
        assert_eq!(input, workflow());
    }

    #[test]
    fn test_clean_workflow() {
        let mut wf = WorkflowModel::new("clean");
        wf.nodes.push(NodeModel::new("n1", "Noop", "n8n-nodes-base.noOp"));
        let result = engine().generate_fixes(&wf, &AutofixConfig::default());
        assert!(result.fixes.is_empty());
        assert_eq!(result.summary, "No fixes found");
    }

    fn fix_with(confidence: Confidence) -> FixOperation {
        FixOperation {
            node: "n".into(),
            node_id: "1".into(),
            field: "typeVersion".into(),
            fix_type: FixType::TypeversionUpgrade,
            before: Value::Null,
            after: Value::Null,
            confidence,
            description: String::new(),
            extra_updates: Map::new(),
        }
    }

    proptest! {
        #[test]
        fn prop_selection_respects_threshold(
            tiers in prop::collection::vec(prop::sample::select(vec![Confidence::Low, Confidence::Medium, Confidence::High]), 0..30),
            threshold in prop::sample::select(vec![Confidence::Low, Confidence::Medium, Confidence::High]),
            max_fixes in 0usize..40,
        ) {
            let fixes: Vec<FixOperation> = tiers.iter().map(|c| fix_with(*c)).collect();
            let selected = select_fixes(fixes, threshold, max_fixes);
            prop_assert!(selected.len() <= max_fixes);
            prop_assert!(selected.iter().all(|f| f.confidence >= threshold));
            prop_assert!(selected.windows(2).all(|w| w[0].confidence >= w[1].confidence));
            let eligible = tiers.iter().filter(|c| **c >= threshold).count();
            prop_assert_eq!(selected.len(), eligible.min(max_fixes));
        }
    }
}
