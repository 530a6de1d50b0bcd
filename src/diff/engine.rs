//! Two-pass application of a diff batch.
//!
//! Node operations run first, in array order. Renames made during that pass
//! are resolved into the connection map once, then connection and metadata
//! operations run in array order against the settled node set. Finally every
//! node goes through the structural sanitizer.

use std::{collections::HashSet, sync::Arc};

use tracing::{debug, warn};

use crate::{
    ValidationError,
    catalog::NodeCatalog,
    diff::{
        operation::{DiffOperation, DiffRequest},
        ports::PortRegistry,
        resolver::ReferenceResolver,
        result::{DiffResult, OperationError},
        validator::{OperationValidator, Plan},
    },
    model::{Connection, WorkflowModel, normalize_name},
    sanitize,
};

pub struct DiffEngine {
    catalog: Arc<dyn NodeCatalog>,
    ports: PortRegistry,
    /// Mode used when a request does not choose one.
    continue_on_error: bool,
}

/// Mutable state of one batch. Dropped at the end of `apply_diff`.
struct Batch {
    workflow: WorkflowModel,
    resolver: ReferenceResolver,
    /// Ids of nodes created by this batch. They own no edges during the node pass.
    added: HashSet<String>,
    /// Normalized node labels targeted by failed node operations.
    failed_nodes: Vec<(usize, String)>,
    result: DiffResult,
}

impl DiffEngine {
    pub fn new(catalog: Arc<dyn NodeCatalog>) -> Self {
        Self {
            catalog,
            ports: PortRegistry::default(),
            continue_on_error: false,
        }
    }

    pub fn with_ports(
        mut self,
        ports: PortRegistry,
    ) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_continue_on_error(
        mut self,
        continue_on_error: bool,
    ) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Apply `request` to a private copy of `workflow`.
    ///
    /// Validation problems never escape as errors: they are reported in the
    /// returned [`DiffResult`] with the index of the offending operation.
    pub fn apply_diff(
        &self,
        workflow: &WorkflowModel,
        request: &DiffRequest,
    ) -> DiffResult {
        let continue_on_error = request.continue_on_error.unwrap_or(self.continue_on_error);
        let validator = OperationValidator::new(self.catalog.as_ref(), &self.ports);
        debug!("diff::apply_diff workflow={} operations={} continue_on_error={}", workflow.name, request.operations.len(), continue_on_error);

        let mut batch = Batch {
            workflow: workflow.clone(),
            resolver: ReferenceResolver::new(),
            added: HashSet::new(),
            failed_nodes: Vec::new(),
            result: DiffResult::default(),
        };

        let (node_ops, other_ops): (Vec<_>, Vec<_>) = request.operations.iter().enumerate().partition(|(_, op)| op.is_node_operation());

        for (index, operation) in node_ops {
            if let Err(failure) = Self::run(&validator, &mut batch, index, operation) {
                if !continue_on_error {
                    warn!("diff::apply_diff aborted at operation {}: {}", index, failure.message);
                    return DiffResult::aborted(failure);
                }
                batch.failed_nodes.extend(failed_labels(operation).into_iter().map(|label| (index, label)));
                batch.record_failure(failure);
            }
        }

        batch.resolver.resolve(&mut batch.workflow);

        for (index, operation) in other_ops {
            if let Err(mut failure) = Self::run(&validator, &mut batch, index, operation) {
                if !continue_on_error {
                    warn!("diff::apply_diff aborted at operation {}: {}", index, failure.message);
                    return DiffResult::aborted(failure);
                }
                if let Some(dependency) = batch.failed_dependency(operation, failure.error.as_ref()) {
                    failure = OperationError::new(index, operation.kind(), dependency);
                }
                batch.record_failure(failure);
            }
        }

        for node in batch.workflow.nodes.iter_mut() {
            sanitize::sanitize_node(node);
        }

        let mut result = batch.result;
        result.success = true;
        result.message = if result.operations_failed > 0 {
            format!("applied {} operations, {} failed", result.operations_applied, result.operations_failed)
        } else {
            format!("applied {} operations", result.operations_applied)
        };
        if request.validate_only {
            result.message.push_str(" (validation only)");
        }
        result.workflow = Some(batch.workflow);
        debug!("diff::apply_diff {}", result.message);
        result
    }

    fn run(
        validator: &OperationValidator,
        batch: &mut Batch,
        index: usize,
        operation: &DiffOperation,
    ) -> Result<(), OperationError> {
        let plan = validator.plan(&batch.workflow, operation).map_err(|e| OperationError::new(index, operation.kind(), e))?;
        batch.apply(plan);
        batch.result.operations_applied += 1;
        batch.result.applied.push(index);
        Ok(())
    }
}

/// Normalized names or ids of the node(s) a failed node operation was about.
fn failed_labels(operation: &DiffOperation) -> Vec<String> {
    let mut labels = Vec::new();
    match operation {
        DiffOperation::AddNode { node } => labels.push(node.name.clone()),
        DiffOperation::RemoveNode { target }
        | DiffOperation::UpdateNode { target, .. }
        | DiffOperation::MoveNode { target, .. }
        | DiffOperation::EnableNode { target }
        | DiffOperation::DisableNode { target } => {
            labels.extend(target.node_id.iter().cloned());
            labels.extend(target.node_name.iter().cloned());
        }
        _ => {}
    }
    if let DiffOperation::UpdateNode { updates, .. } = operation
        && let Some(new_name) = updates.get("name").and_then(|v| v.as_str())
    {
        labels.push(new_name.to_string());
    }
    labels.iter().map(|l| normalize_name(l)).collect()
}

impl Batch {
    fn record_failure(
        &mut self,
        failure: OperationError,
    ) {
        warn!("diff::apply_diff skipped operation {} ({}): {}", failure.operation_index, failure.kind, failure.message);
        self.result.operations_failed += 1;
        self.result.failed.push(failure.operation_index);
        self.result.failures.push(failure);
    }

    /// A connection operation that failed because one of its endpoints is
    /// missing, where that endpoint is a node whose own operation failed.
    fn failed_dependency(
        &self,
        operation: &DiffOperation,
        error: Option<&ValidationError>,
    ) -> Option<ValidationError> {
        let Some(ValidationError::NodeNotFound(missing)) = error else {
            return None;
        };
        let missing = normalize_name(missing);
        operation
            .endpoints()
            .into_iter()
            .filter(|endpoint| normalize_name(endpoint) == missing)
            .find_map(|endpoint| {
                self.failed_nodes.iter().find(|(_, label)| *label == missing).map(|(index, _)| ValidationError::DependencyFailed {
                    index: *index,
                    node: endpoint.to_string(),
                })
            })
    }

    fn apply(
        &mut self,
        plan: Plan,
    ) {
        let workflow = &mut self.workflow;
        match plan {
            Plan::AddNode(node) => {
                self.added.insert(node.id.clone());
                workflow.nodes.push(node);
            }
            Plan::RemoveNode { index } => {
                let node = workflow.nodes.remove(index);
                // edges are still keyed by the names nodes had when the batch started
                let key = if self.added.remove(&node.id) {
                    // a node added by this batch only has stale edges under its name,
                    // unless an existing node started the batch with that name
                    let owned = workflow
                        .nodes
                        .iter()
                        .any(|n| !self.added.contains(&n.id) && self.resolver.original_name(&n.id).unwrap_or(n.name.as_str()) == node.name);
                    (!owned).then(|| node.name.clone())
                } else {
                    Some(self.resolver.original_name(&node.id).unwrap_or(node.name.as_str()).to_string())
                };
                if let Some(key) = key {
                    let removed = workflow.connections.remove_node(&key);
                    debug!("diff::remove_node {} cascaded {} connections", node.name, removed.len());
                }
                self.resolver.forget(&node.id);
            }
            Plan::UpdateNode { index, node, renamed_from } => {
                if let Some(old_name) = renamed_from
                    && !self.added.contains(&node.id)
                {
                    self.resolver.record_rename(&node.id, &old_name);
                }
                workflow.nodes[index] = node;
            }
            Plan::MoveNode { index, position } => workflow.nodes[index].position = position,
            Plan::SetDisabled { index, disabled } => workflow.nodes[index].disabled = disabled,
            Plan::AddConnection(edge) => {
                workflow.connections.add(edge);
            }
            Plan::RemoveConnection(Some(edge)) => {
                workflow.connections.remove(&edge);
            }
            Plan::RemoveConnection(None) => self.result.warnings.push("connection to remove was not found, ignored".to_string()),
            Plan::Rewire { remove, add } => {
                workflow.connections.remove(&remove);
                workflow.connections.add(add);
            }
            Plan::CleanStale { dry_run } => {
                let names: HashSet<String> = workflow.nodes.iter().map(|n| n.name.clone()).collect();
                let is_live = |e: &Connection| names.contains(&e.source) && names.contains(&e.target);
                if dry_run {
                    let stale = workflow.connections.edges().into_iter().filter(|e| !is_live(e));
                    self.result.warnings.extend(stale.map(|e| format!("stale connection {} would be removed", e)));
                } else {
                    let removed = workflow.connections.retain(is_live);
                    debug!("diff::clean_stale_connections removed {}", removed.len());
                }
            }
            Plan::ReplaceConnections(connections) => workflow.connections = connections,
            Plan::UpdateSettings(settings) => workflow.settings.extend(settings),
            Plan::UpdateName(name) => workflow.name = name,
            Plan::AddTag(tag) => {
                if workflow.has_tag(&tag) {
                    self.result.warnings.push(format!("tag '{}' already present", tag));
                } else {
                    workflow.tags.push(tag);
                }
            }
            Plan::RemoveTag(tag) => {
                if workflow.has_tag(&tag) {
                    workflow.tags.retain(|t| *t != tag);
                } else {
                    self.result.warnings.push(format!("tag '{}' not present", tag));
                }
            }
            Plan::Activate => {
                self.result.should_activate = true;
                self.result.should_deactivate = false;
            }
            Plan::Deactivate => {
                self.result.should_activate = false;
                self.result.should_deactivate = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use serde_json::{Map, json};

    use super::*;
    use crate::{
        catalog::StaticCatalog,
        diff::operation::{NewNode, NodeRef, PortSpec},
        model::{Connection, NodeModel},
    };

    fn engine() -> DiffEngine {
        DiffEngine::new(Arc::new(StaticCatalog::builtin().unwrap()))
    }

    fn workflow() -> WorkflowModel {
        let mut wf = WorkflowModel::new("orders");
        wf.nodes.push(NodeModel::new("w1", "Webhook", "n8n-nodes-base.webhook").with_version(2.0));
        wf.nodes.push(NodeModel::new("o1", "Old", "n8n-nodes-base.set"));
        wf.nodes.push(NodeModel::new("c1", "C", "n8n-nodes-base.noOp"));
        wf.connections.add(Connection::main("Webhook", 0, "Old"));
        wf.connections.add(Connection::main("Old", 0, "C"));
        wf
    }

    fn rename(
        target: &str,
        name: &str,
    ) -> DiffOperation {
        let mut updates = Map::new();
        updates.insert("name".into(), json!(name));
        DiffOperation::UpdateNode {
            target: NodeRef::name(target),
            updates,
        }
    }

    #[test]
    fn test_branch_connection_on_empty_workflow() {
        let ops = vec![
            DiffOperation::AddNode {
                node: NewNode::new("A", "n8n-nodes-base.if"),
            },
            DiffOperation::AddNode {
                node: NewNode::new("B", "n8n-nodes-base.noOp"),
            },
            DiffOperation::AddConnection {
                source: "A".into(),
                target: "B".into(),
                ports: PortSpec::branch("true"),
            },
        ];
        let result = engine().apply_diff(&WorkflowModel::new("empty"), &DiffRequest::new(ops));
        assert!(result.success);
        let edges = result.workflow.unwrap().connections.edges();
        assert_eq!(edges, vec![Connection::main("A", 0, "B")]);
    }

    #[test]
    fn test_connection_before_node_in_array() {
        // connections may name nodes added later in the same batch
        let ops = vec![
            DiffOperation::AddConnection {
                source: "C".into(),
                target: "Late".into(),
                ports: PortSpec::default(),
            },
            DiffOperation::AddNode {
                node: NewNode::new("Late", "n8n-nodes-base.noOp"),
            },
        ];
        let result = engine().apply_diff(&workflow(), &DiffRequest::new(ops));
        assert!(result.success);
        assert_eq!(result.applied, vec![1, 0]);
    }

    #[test]
    fn test_rename_rewrites_connections() {
        let result = engine().apply_diff(&workflow(), &DiffRequest::new(vec![rename("Old", "New")]));
        let wf = result.workflow.unwrap();
        assert!(wf.connections.contains(&Connection::main("New", 0, "C")));
        assert!(wf.connections.contains(&Connection::main("Webhook", 0, "New")));
        assert!(!wf.connections.referenced_nodes().contains("Old"));
    }

    #[test]
    fn test_remove_node_cascades() {
        let ops = vec![DiffOperation::RemoveNode { target: NodeRef::name("Old") }];
        let wf = engine().apply_diff(&workflow(), &DiffRequest::new(ops)).workflow.unwrap();
        assert!(wf.connections.is_empty());
        assert_eq!(wf.nodes.len(), 2);
    }

    #[test]
    fn test_rename_then_remove_cascades_original_edges() {
        let ops = vec![rename("Old", "Tmp"), DiffOperation::RemoveNode { target: NodeRef::name("Tmp") }];
        let wf = engine().apply_diff(&workflow(), &DiffRequest::new(ops)).workflow.unwrap();
        assert!(wf.connections.is_empty());
    }

    #[test]
    fn test_add_then_remove_in_one_batch() {
        let mut input = workflow();
        input.connections.add(Connection::main("C", 0, "X"));
        let ops = vec![
            DiffOperation::AddNode {
                node: NewNode::new("X", "n8n-nodes-base.noOp"),
            },
            DiffOperation::RemoveNode { target: NodeRef::name("X") },
        ];
        let wf = engine().apply_diff(&input, &DiffRequest::new(ops)).workflow.unwrap();

        let mut expected = input.connections.clone();
        expected.retain(|e| !e.touches("X"));
        assert_eq!(wf.connections, expected);
        assert_eq!(wf.nodes, workflow().nodes);
    }

    #[test]
    fn test_add_then_remove_reusing_a_renamed_name() {
        let ops = vec![
            rename("Old", "Tmp"),
            DiffOperation::AddNode {
                node: NewNode::new("Old", "n8n-nodes-base.noOp"),
            },
            DiffOperation::RemoveNode { target: NodeRef::name("Old") },
        ];
        let wf = engine().apply_diff(&workflow(), &DiffRequest::new(ops)).workflow.unwrap();
        assert!(wf.connections.contains(&Connection::main("Webhook", 0, "Tmp")));
        assert!(wf.connections.contains(&Connection::main("Tmp", 0, "C")));
        assert_eq!(wf.connections.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_rename_rewrites_every_edge(
            node_count in 2usize..7,
            raw_edges in prop::collection::vec((0usize..7, 0usize..3, 0usize..7), 0..16),
            renamed in 0usize..7,
        ) {
            let renamed = renamed % node_count;
            let mut input = WorkflowModel::new("topology");
            for i in 0..node_count {
                input.nodes.push(NodeModel::new(format!("id{}", i), format!("N{}", i), "n8n-nodes-base.noOp"));
            }
            for (source, output, target) in raw_edges {
                input.connections.add(Connection::main(format!("N{}", source % node_count), output, format!("N{}", target % node_count)));
            }

            let old_name = format!("N{}", renamed);
            let result = engine().apply_diff(&input, &DiffRequest::new(vec![rename(&old_name, "Renamed")]));
            prop_assert!(result.success);
            let wf = result.workflow.unwrap();

            prop_assert!(!wf.connections.referenced_nodes().contains(&old_name));
            let expected: BTreeSet<Connection> = input
                .connections
                .edges()
                .into_iter()
                .map(|mut e| {
                    if e.source == old_name {
                        e.source = "Renamed".into();
                    }
                    if e.target == old_name {
                        e.target = "Renamed".into();
                    }
                    e
                })
                .collect();
            prop_assert_eq!(wf.connections.edges().into_iter().collect::<BTreeSet<_>>(), expected);
        }
    }

    #[test]
    fn test_atomic_failure_returns_only_errors() {
        let input = workflow();
        let ops = vec![
            DiffOperation::MoveNode {
                target: NodeRef::name("C"),
                position: [10.0, 10.0],
            },
            DiffOperation::RemoveNode { target: NodeRef::name("Ghost") },
        ];
        let result = engine().apply_diff(&input, &DiffRequest::new(ops));
        assert!(!result.success);
        assert!(result.workflow.is_none());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].operation_index, 1);
        assert_eq!(input, workflow());
    }

    #[test]
    fn test_best_effort_reports_failures() {
        let ops = vec![
            DiffOperation::RemoveNode { target: NodeRef::name("Ghost") },
            DiffOperation::AddTag { tag: "prod".into() },
            DiffOperation::AddConnection {
                source: "Webhook".into(),
                target: "Old".into(),
                ports: PortSpec::default(),
            },
        ];
        let result = engine().apply_diff(&workflow(), &DiffRequest::new(ops).continue_on_error(true));
        assert!(result.success);
        assert_eq!(result.operations_applied, 1);
        assert_eq!(result.operations_failed, 2);
        assert_eq!(result.failed, vec![0, 2]);
        assert_eq!(result.workflow.unwrap().tags, vec!["prod".to_string()]);
    }

    #[test]
    fn test_dependency_failed() {
        let ops = vec![
            DiffOperation::AddNode {
                node: NewNode::new("C", "n8n-nodes-base.noOp"),
            },
            DiffOperation::AddConnection {
                source: "Webhook".into(),
                target: "Fresh".into(),
                ports: PortSpec::default(),
            },
            DiffOperation::AddNode {
                node: NewNode::new("Fresh", "").with_version(1.0),
            },
        ];
        let result = engine().apply_diff(&workflow(), &DiffRequest::new(ops).continue_on_error(true));
        assert_eq!(result.failed, vec![0, 2, 1]);
        let dependency = result.failures.iter().find(|f| f.operation_index == 1).unwrap();
        assert_eq!(
            dependency.error,
            Some(ValidationError::DependencyFailed {
                index: 2,
                node: "Fresh".into()
            })
        );
    }

    #[test]
    fn test_stale_connections() {
        let mut input = workflow();
        input.connections.add(Connection::main("C", 0, "Gone"));

        let dry = engine().apply_diff(&input, &DiffRequest::new(vec![DiffOperation::CleanStaleConnections { dry_run: true }]));
        assert_eq!(dry.warnings.len(), 1);
        assert_eq!(dry.workflow.unwrap().connections.len(), 3);

        let wet = engine().apply_diff(&input, &DiffRequest::new(vec![DiffOperation::CleanStaleConnections { dry_run: false }]));
        assert_eq!(wet.workflow.unwrap().connections.len(), 2);
    }

    #[test]
    fn test_metadata_and_activation() {
        let ops = vec![
            DiffOperation::UpdateName { name: "renamed".into() },
            DiffOperation::RemoveTag { tag: "absent".into() },
            DiffOperation::UpdateSettings {
                settings: json!({"timezone": "UTC"}).as_object().unwrap().clone(),
            },
            DiffOperation::ActivateWorkflow,
        ];
        let result = engine().apply_diff(&workflow(), &DiffRequest::new(ops));
        assert!(result.should_activate);
        assert_eq!(result.warnings, vec!["tag 'absent' not present".to_string()]);
        let wf = result.workflow.unwrap();
        assert_eq!(wf.name, "renamed");
        assert_eq!(wf.settings["timezone"], json!("UTC"));
    }

    #[test]
    fn test_sanitizer_runs_after_batch() {
        let ops = vec![DiffOperation::AddNode {
            node: NewNode::new("Check", "n8n-nodes-base.if").with_version(2.2).with_parameters(json!({
                "conditions": {"conditions": [{"leftValue": "={{ $json.a }}", "operator": {"type": "isNotEmpty"}}]}
            })),
        }];
        let wf = engine().apply_diff(&workflow(), &DiffRequest::new(ops)).workflow.unwrap();
        let node = wf.node_by_name("Check").unwrap();
        assert_eq!(
            node.parameters["conditions"]["conditions"][0]["operator"],
            json!({"type": "boolean", "operation": "isNotEmpty", "singleValue": true})
        );
        assert_eq!(node.parameters["conditions"]["options"]["typeValidation"], json!("strict"));
    }
}
