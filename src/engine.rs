//! Engine - the main entry point for Flowmend.
//!
//! The engine ties the pipeline to a workflow store:
//! - Fetching a workflow snapshot and applying a diff batch to it
//! - Generating (and optionally applying) autofixes
//! - Analyzing node version upgrades
//! - Persisting results only when they actually changed something

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    Config, Result,
    autofix::{AutofixConfig, AutofixEngine, AutofixResult},
    breaking::{BreakingChangeAnalyzer, BreakingChangeRegistry, VersionUpgradeAnalysis},
    catalog::{NodeCatalog, StaticCatalog},
    common::Version,
    diff::{DiffEngine, DiffRequest, DiffResult, PortRegistry},
    model::WorkflowModel,
    store::{MemStore, WorkflowStore},
};

/// The workflow repair engine.
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().build()?;
/// engine.deploy("wf1", &workflow)?;
///
/// let request = DiffRequest::new(vec![DiffOperation::UpdateName { name: "Orders".into() }]);
/// let result = engine.update_workflow("wf1", &request)?;
///
/// let fixes = engine.autofix_workflow("wf1", &AutofixConfig::default())?;
/// ```
pub struct Engine {
    config: Config,
    catalog: Arc<dyn NodeCatalog>,
    diff: Arc<DiffEngine>,
    analyzer: BreakingChangeAnalyzer,
    autofix: AutofixEngine,
    /// Snapshot storage for workflows.
    store: Arc<dyn WorkflowStore>,
}

impl Engine {
    /// Creates a new engine with the given configuration, the built-in
    /// catalog and registry and an in-memory store.
    pub fn new_with_config(config: Config) -> Result<Self> {
        let catalog: Arc<dyn NodeCatalog> = Arc::new(StaticCatalog::builtin()?);
        let registry = Arc::new(BreakingChangeRegistry::builtin()?);
        let store: Arc<dyn WorkflowStore> = Arc::new(MemStore::new(config.store.initial_capacity));
        Ok(Self::from_parts(config, catalog, registry, store, PortRegistry::default()))
    }

    pub(crate) fn from_parts(
        config: Config,
        catalog: Arc<dyn NodeCatalog>,
        registry: Arc<BreakingChangeRegistry>,
        store: Arc<dyn WorkflowStore>,
        ports: PortRegistry,
    ) -> Self {
        let diff = Arc::new(DiffEngine::new(catalog.clone()).with_ports(ports).with_continue_on_error(config.diff.continue_on_error));
        let analyzer = BreakingChangeAnalyzer::new(registry, catalog.clone());
        let autofix = AutofixEngine::new(catalog.clone(), analyzer.clone(), diff.clone());

        Self {
            config,
            catalog,
            diff,
            analyzer,
            autofix,
            store,
        }
    }

    /// Stores a workflow as the current snapshot for `id`.
    pub fn deploy(
        &self,
        id: &str,
        workflow: &WorkflowModel,
    ) -> Result<bool> {
        self.store.persist(id, workflow)
    }

    /// Loads the current snapshot for `id`.
    pub fn workflow(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        self.store.fetch(id)
    }

    /// Apply a diff batch to a stored workflow.
    ///
    /// Validation failures are reported in the returned result. Only a
    /// malformed stored document or a store failure is an `Err`. The new
    /// snapshot is persisted when the batch succeeded, applied at least one
    /// operation and was not `validateOnly`.
    pub fn update_workflow(
        &self,
        id: &str,
        request: &DiffRequest,
    ) -> Result<DiffResult> {
        let workflow = self.store.fetch(id)?;
        let mut result = self.diff.apply_diff(&workflow, request);

        if let Some(updated) = result.workflow.as_mut() {
            if result.should_activate {
                updated.active = true;
            }
            if result.should_deactivate {
                updated.active = false;
            }
        }

        if request.validate_only || !result.has_changes() {
            debug!("engine::update_workflow({}) not persisted, success={} applied={}", id, result.success, result.operations_applied);
            return Ok(result);
        }
        if let Some(updated) = result.workflow.as_ref() {
            self.store.persist(id, updated)?;
            info!("engine::update_workflow({}) persisted, applied={} failed={}", id, result.operations_applied, result.operations_failed);
        }
        Ok(result)
    }

    /// Generate fixes for a stored workflow. When `config.apply_fixes` is
    /// set and at least one fix was applied, the fixed workflow is persisted.
    pub fn autofix_workflow(
        &self,
        id: &str,
        config: &AutofixConfig,
    ) -> Result<AutofixResult> {
        let workflow = self.store.fetch(id)?;
        let result = self.autofix.generate_fixes(&workflow, config);

        if result.applied()
            && let Some(fixed) = result.workflow.as_ref()
        {
            self.store.persist(id, fixed)?;
            info!("engine::autofix_workflow({}) persisted {} fixes", id, result.fixes.len());
        }
        Ok(result)
    }

    /// Autofix config built from the engine's configured defaults.
    pub fn autofix_config(&self) -> AutofixConfig {
        AutofixConfig::from(&self.config.autofix)
    }

    /// Apply a diff batch to a workflow that is not in the store.
    pub fn apply_diff(
        &self,
        workflow: &WorkflowModel,
        request: &DiffRequest,
    ) -> DiffResult {
        self.diff.apply_diff(workflow, request)
    }

    pub fn analyze_version_upgrade(
        &self,
        node_type: &str,
        from: &Version,
        to: &Version,
    ) -> VersionUpgradeAnalysis {
        self.analyzer.analyze_version_upgrade(node_type, from, to)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> Arc<dyn NodeCatalog> {
        self.catalog.clone()
    }

    pub fn diff_engine(&self) -> Arc<DiffEngine> {
        self.diff.clone()
    }

    pub fn analyzer(&self) -> &BreakingChangeAnalyzer {
        &self.analyzer
    }

    pub fn autofix_engine(&self) -> &AutofixEngine {
        &self.autofix
    }

    pub fn store(&self) -> Arc<dyn WorkflowStore> {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        EngineBuilder, FlowmendError,
        diff::{DiffOperation, NodeRef},
        model::{Connection, NodeModel},
    };

    fn workflow() -> WorkflowModel {
        let mut wf = WorkflowModel::new("orders");
        wf.nodes.push(NodeModel::new("h1", "Hook", "n8n-nodes-base.webhook").with_version(2.1).with_parameters(json!({"path": "orders"})));
        wf.nodes.push(NodeModel::new("c1", "Call", "n8n-nodes-base.httpRequest").with_version(4.2));
        wf.connections.add(Connection::main("Hook", 0, "Call"));
        wf
    }

    fn engine() -> Engine {
        let engine = EngineBuilder::new().build().unwrap();
        engine.deploy("wf1", &workflow()).unwrap();
        engine
    }

    fn rename(
        id: &str,
        name: &str,
    ) -> DiffOperation {
        let mut updates = serde_json::Map::new();
        updates.insert("name".into(), json!(name));
        DiffOperation::UpdateNode {
            target: NodeRef::id(id),
            updates,
        }
    }

    #[test]
    fn test_update_persists() {
        let engine = engine();
        let request = DiffRequest::new(vec![rename("c1", "Fetch"), DiffOperation::ActivateWorkflow]);
        let result = engine.update_workflow("wf1", &request).unwrap();
        assert!(result.success);

        let stored = engine.workflow("wf1").unwrap();
        assert!(stored.active);
        assert!(stored.node_by_name("Fetch").is_some());
        assert_eq!(stored.connections.targets("Hook", "main", 0).map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_validate_only_not_persisted() {
        let engine = engine();
        let request = DiffRequest::new(vec![rename("c1", "Fetch")]).validate_only(true);
        let result = engine.update_workflow("wf1", &request).unwrap();
        assert!(result.success);
        assert!(result.workflow.unwrap().node_by_name("Fetch").is_some());
        assert!(engine.workflow("wf1").unwrap().node_by_name("Call").is_some());
    }

    #[test]
    fn test_failed_batch_not_persisted() {
        let engine = engine();
        let request = DiffRequest::new(vec![rename("c1", "Fetch"), DiffOperation::RemoveNode { target: NodeRef::name("Ghost") }]);
        let result = engine.update_workflow("wf1", &request).unwrap();
        assert!(!result.success);
        assert!(result.workflow.is_none());
        assert!(engine.workflow("wf1").unwrap().node_by_name("Call").is_some());
    }

    #[test]
    fn test_configured_default_mode() {
        let mut config = Config::default();
        config.diff.continue_on_error = true;
        let engine = EngineBuilder::new().config(config).build().unwrap();
        engine.deploy("wf1", &workflow()).unwrap();

        let request = DiffRequest::new(vec![rename("c1", "Fetch"), DiffOperation::RemoveNode { target: NodeRef::name("Ghost") }]);
        let result = engine.update_workflow("wf1", &request).unwrap();
        assert!(result.success);
        assert_eq!(result.failed, vec![1]);
        assert!(engine.workflow("wf1").unwrap().node_by_name("Fetch").is_some());
    }

    #[test]
    fn test_autofix_persists_applied_fixes() {
        let engine = engine();
        let mut wf = workflow();
        wf.nodes[1].parameters = json!({"url": "{{ $json.url }}"});
        engine.deploy("wf2", &wf).unwrap();

        let preview = engine.autofix_workflow("wf2", &engine.autofix_config()).unwrap();
        assert_eq!(preview.fixes.len(), 1);
        assert_eq!(engine.workflow("wf2").unwrap().nodes[1].parameters["url"], json!("{{ $json.url }}"));

        let config = AutofixConfig {
            apply_fixes: true,
            ..engine.autofix_config()
        };
        let applied = engine.autofix_workflow("wf2", &config).unwrap();
        assert!(applied.applied());
        assert_eq!(engine.workflow("wf2").unwrap().nodes[1].parameters["url"], json!("={{ $json.url }}"));
    }

    #[test]
    fn test_missing_workflow() {
        let engine = engine();
        let request = DiffRequest::new(vec![DiffOperation::ActivateWorkflow]);
        assert!(matches!(engine.update_workflow("nope", &request), Err(FlowmendError::Store(_))));
    }

    #[test]
    fn test_analyze_version_upgrade() {
        let engine = engine();
        let analysis = engine.analyze_version_upgrade("webhook", &Version::from(1.0), &Version::from(2.1));
        assert!(analysis.has_breaking_changes);
        assert!(analysis.manual_required_count > 0);
    }
}
