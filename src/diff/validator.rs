//! Per-operation validation.
//!
//! Validating an operation against the current snapshot yields a [`Plan`]:
//! the operation with every reference resolved (node positions, concrete
//! ports, generated ids). The diff engine only ever applies plans, so an
//! operation that validates is guaranteed to apply.

use serde_json::{Map, Value};

use crate::{
    ValidationError,
    catalog::{NodeCatalog, is_activatable_trigger},
    common::path::set_path,
    diff::{
        operation::{DiffOperation, NewNode, NodeRef, PortSpec},
        ports::{PortRegistry, PortSelector},
    },
    model::{Connection, Connections, NodeModel, WorkflowModel, normalize_name},
    utils,
};

/// A validated operation, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    AddNode(NodeModel),
    RemoveNode {
        index: usize,
    },
    UpdateNode {
        index: usize,
        node: NodeModel,
        renamed_from: Option<String>,
    },
    MoveNode {
        index: usize,
        position: [f64; 2],
    },
    SetDisabled {
        index: usize,
        disabled: bool,
    },
    AddConnection(Connection),
    /// `None` when the edge was already gone and errors are ignored.
    RemoveConnection(Option<Connection>),
    Rewire {
        remove: Connection,
        add: Connection,
    },
    CleanStale {
        dry_run: bool,
    },
    ReplaceConnections(Connections),
    UpdateSettings(Map<String, Value>),
    UpdateName(String),
    AddTag(String),
    RemoveTag(String),
    Activate,
    Deactivate,
}

/// Resolve a node reference: exact id first, then normalized name.
///
/// When several nodes share a normalized name, a unique exact-name match
/// still wins; otherwise the reference is ambiguous.
pub fn resolve_node(
    workflow: &WorkflowModel,
    reference: &str,
) -> Result<usize, ValidationError> {
    if let Some(index) = workflow.node_index_by_id(reference) {
        return Ok(index);
    }

    let wanted = normalize_name(reference);
    let matches: Vec<usize> = workflow.nodes.iter().enumerate().filter(|(_, n)| normalize_name(&n.name) == wanted).map(|(i, _)| i).collect();
    match matches.len() {
        0 => Err(ValidationError::NodeNotFound(reference.to_string())),
        1 => Ok(matches[0]),
        count => {
            let exact: Vec<usize> = matches.iter().copied().filter(|i| workflow.nodes[*i].name == reference).collect();
            match exact.as_slice() {
                [only] => Ok(*only),
                _ => Err(ValidationError::AmbiguousNode {
                    reference: reference.to_string(),
                    count,
                }),
            }
        }
    }
}

/// Resolve a `nodeId` / `nodeName` pair. An id that matches nothing falls
/// back to the name when one is given.
pub fn resolve_node_ref(
    workflow: &WorkflowModel,
    target: &NodeRef,
) -> Result<usize, ValidationError> {
    match (&target.node_id, &target.node_name) {
        (Some(id), Some(name)) => resolve_node(workflow, id).or_else(|_| resolve_node(workflow, name)),
        (Some(id), None) => resolve_node(workflow, id),
        (None, Some(name)) => resolve_node(workflow, name),
        (None, None) => Err(ValidationError::MissingNodeReference),
    }
}

pub struct OperationValidator<'a> {
    catalog: &'a dyn NodeCatalog,
    ports: &'a PortRegistry,
}

impl<'a> OperationValidator<'a> {
    pub fn new(
        catalog: &'a dyn NodeCatalog,
        ports: &'a PortRegistry,
    ) -> Self {
        Self { catalog, ports }
    }

    /// Decide whether `operation` applies to `workflow`.
    pub fn validate(
        &self,
        workflow: &WorkflowModel,
        operation: &DiffOperation,
    ) -> Option<ValidationError> {
        self.plan(workflow, operation).err()
    }

    /// Validate `operation` and resolve it into a [`Plan`].
    pub fn plan(
        &self,
        workflow: &WorkflowModel,
        operation: &DiffOperation,
    ) -> Result<Plan, ValidationError> {
        match operation {
            DiffOperation::AddNode { node } => self.plan_add_node(workflow, node),
            DiffOperation::RemoveNode { target } => Ok(Plan::RemoveNode {
                index: resolve_node_ref(workflow, target)?,
            }),
            DiffOperation::UpdateNode { target, updates } => self.plan_update_node(workflow, target, updates),
            DiffOperation::MoveNode { target, position } => Ok(Plan::MoveNode {
                index: resolve_node_ref(workflow, target)?,
                position: *position,
            }),
            DiffOperation::EnableNode { target } => Ok(Plan::SetDisabled {
                index: resolve_node_ref(workflow, target)?,
                disabled: false,
            }),
            DiffOperation::DisableNode { target } => Ok(Plan::SetDisabled {
                index: resolve_node_ref(workflow, target)?,
                disabled: true,
            }),
            DiffOperation::AddConnection { source, target, ports } => self.plan_add_connection(workflow, source, target, ports),
            DiffOperation::RemoveConnection {
                source,
                target,
                ports,
                ignore_errors,
            } => match self.find_existing_edge(workflow, source, target, ports) {
                Ok(edge) => Ok(Plan::RemoveConnection(Some(edge))),
                Err(_) if *ignore_errors => Ok(Plan::RemoveConnection(None)),
                Err(e) => Err(e),
            },
            DiffOperation::RewireConnection { source, from, to, ports } => self.plan_rewire(workflow, source, from, to, ports),
            DiffOperation::CleanStaleConnections { dry_run } => Ok(Plan::CleanStale { dry_run: *dry_run }),
            DiffOperation::ReplaceConnections { connections } => {
                if let Some(unknown) = connections.referenced_nodes().into_iter().find(|name| workflow.node_index_by_name(name).is_none()) {
                    return Err(ValidationError::UnknownEndpoint(unknown));
                }
                Ok(Plan::ReplaceConnections(connections.clone()))
            }
            DiffOperation::UpdateSettings { settings } => Ok(Plan::UpdateSettings(settings.clone())),
            DiffOperation::UpdateName { name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ValidationError::EmptyWorkflowName);
                }
                Ok(Plan::UpdateName(name.to_string()))
            }
            DiffOperation::AddTag { tag } => Ok(Plan::AddTag(Self::check_tag(tag)?)),
            DiffOperation::RemoveTag { tag } => Ok(Plan::RemoveTag(Self::check_tag(tag)?)),
            DiffOperation::ActivateWorkflow => {
                if workflow.nodes.iter().any(|n| is_activatable_trigger(self.catalog, n)) {
                    Ok(Plan::Activate)
                } else {
                    Err(ValidationError::NoActivatableTrigger)
                }
            }
            DiffOperation::DeactivateWorkflow => Ok(Plan::Deactivate),
        }
    }

    fn check_tag(tag: &str) -> Result<String, ValidationError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ValidationError::InvalidUpdate("tag cannot be empty".to_string()));
        }
        Ok(tag.to_string())
    }

    fn plan_add_node(
        &self,
        workflow: &WorkflowModel,
        node: &NewNode,
    ) -> Result<Plan, ValidationError> {
        let name = node.name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidNode("node name cannot be empty".to_string()));
        }
        if node.node_type.trim().is_empty() {
            return Err(ValidationError::InvalidNode(format!("node '{}' has no type", name)));
        }
        if !(node.type_version > 0.0) {
            return Err(ValidationError::InvalidNode(format!("node '{}' has invalid typeVersion {}", name, node.type_version)));
        }
        if !node.parameters.is_object() {
            return Err(ValidationError::InvalidNode(format!("parameters of node '{}' must be an object", name)));
        }
        if workflow.name_taken(name, None) {
            return Err(ValidationError::DuplicateNodeName(name.to_string()));
        }
        let id = match &node.id {
            Some(id) if workflow.node_index_by_id(id).is_some() => return Err(ValidationError::DuplicateNodeId(id.clone())),
            Some(id) => id.clone(),
            None => utils::longid(),
        };

        Ok(Plan::AddNode(NodeModel {
            id,
            name: name.to_string(),
            node_type: node.node_type.trim().to_string(),
            type_version: node.type_version,
            position: node.position,
            parameters: node.parameters.clone(),
            disabled: node.disabled,
            credentials: node.credentials.clone(),
            on_error: node.on_error.clone(),
            webhook_id: node.webhook_id.clone(),
            notes: None,
        }))
    }

    fn plan_update_node(
        &self,
        workflow: &WorkflowModel,
        target: &NodeRef,
        updates: &Map<String, Value>,
    ) -> Result<Plan, ValidationError> {
        let index = resolve_node_ref(workflow, target)?;
        let current = &workflow.nodes[index];
        if updates.is_empty() {
            return Err(ValidationError::InvalidUpdate("no updates given".to_string()));
        }

        let mut doc = serde_json::to_value(current).map_err(|e| ValidationError::InvalidUpdate(e.to_string()))?;
        for (path, value) in updates {
            if path == "id" || path.starts_with("id.") {
                return Err(ValidationError::InvalidUpdate("node id cannot be changed".to_string()));
            }
            if !set_path(&mut doc, path, value.clone()) {
                return Err(ValidationError::InvalidUpdate(format!("cannot set '{}' on node '{}'", path, current.name)));
            }
        }
        let mut node: NodeModel = serde_json::from_value(doc).map_err(|e| ValidationError::InvalidUpdate(format!("node '{}': {}", current.name, e)))?;
        if !node.parameters.is_object() {
            return Err(ValidationError::InvalidUpdate(format!("parameters of node '{}' must be an object", current.name)));
        }

        let renamed_from = if node.name != current.name {
            node.name = node.name.trim().to_string();
            if node.name.is_empty() {
                return Err(ValidationError::InvalidUpdate("node name cannot be empty".to_string()));
            }
            if workflow.name_taken(&node.name, Some(&current.id)) {
                return Err(ValidationError::DuplicateNodeName(node.name.clone()));
            }
            (node.name != current.name).then(|| current.name.clone())
        } else {
            None
        };

        Ok(Plan::UpdateNode { index, node, renamed_from })
    }

    /// Output index selected by `ports` on `source`.
    fn source_index(
        &self,
        source: &NodeModel,
        ports: &PortSpec,
    ) -> Result<Option<usize>, ValidationError> {
        let selector = match (&ports.branch, ports.case) {
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingPort),
            (Some(branch), None) => Some(PortSelector::Branch(branch.clone())),
            (None, Some(case)) => Some(PortSelector::Case(case)),
            (None, None) => None,
        };
        match (ports.source_index, selector) {
            (Some(_), Some(_)) => Err(ValidationError::ConflictingPort),
            (Some(index), None) => Ok(Some(index)),
            (None, Some(selector)) => self.ports.resolve(source, &selector).map(Some),
            (None, None) => Ok(None),
        }
    }

    fn plan_add_connection(
        &self,
        workflow: &WorkflowModel,
        source: &str,
        target: &str,
        ports: &PortSpec,
    ) -> Result<Plan, ValidationError> {
        let source = &workflow.nodes[resolve_node(workflow, source)?];
        let target = &workflow.nodes[resolve_node(workflow, target)?];
        let source_index = self.source_index(source, ports)?.unwrap_or(0);

        let edge = Connection {
            source: source.name.clone(),
            source_output: ports.source_output.clone(),
            source_index,
            target: target.name.clone(),
            target_input: ports.target_input().to_string(),
            target_index: ports.target_index.unwrap_or(0),
        };
        if workflow.connections.contains(&edge) {
            return Err(ValidationError::ConnectionExists {
                from: edge.source,
                output: edge.source_output,
                index: edge.source_index,
                to: edge.target,
            });
        }
        Ok(Plan::AddConnection(edge))
    }

    /// Find the existing edge `source -> target` that `ports` designates.
    /// Without an explicit index or selector any output slot matches.
    fn find_existing_edge(
        &self,
        workflow: &WorkflowModel,
        source: &str,
        target: &str,
        ports: &PortSpec,
    ) -> Result<Connection, ValidationError> {
        let source = &workflow.nodes[resolve_node(workflow, source)?];
        let target = &workflow.nodes[resolve_node(workflow, target)?];
        let source_index = self.source_index(source, ports)?;
        let target_input = ports.target_input();

        workflow
            .connections
            .edges()
            .into_iter()
            .find(|e| {
                e.source == source.name
                    && e.target == target.name
                    && e.source_output == ports.source_output
                    && e.target_input == target_input
                    && source_index.is_none_or(|i| e.source_index == i)
                    && ports.target_index.is_none_or(|i| e.target_index == i)
            })
            .ok_or_else(|| ValidationError::ConnectionNotFound {
                from: source.name.clone(),
                to: target.name.clone(),
            })
    }

    fn plan_rewire(
        &self,
        workflow: &WorkflowModel,
        source: &str,
        from: &str,
        to: &str,
        ports: &PortSpec,
    ) -> Result<Plan, ValidationError> {
        let remove = self.find_existing_edge(workflow, source, from, ports)?;
        let to = &workflow.nodes[resolve_node(workflow, to)?];
        let add = Connection {
            target: to.name.clone(),
            ..remove.clone()
        };
        if workflow.connections.contains(&add) {
            return Err(ValidationError::ConnectionExists {
                from: add.source,
                output: add.source_output,
                index: add.source_index,
                to: add.target,
            });
        }
        Ok(Plan::Rewire { remove, add })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{catalog::StaticCatalog, model::Connection};

    fn workflow() -> WorkflowModel {
        let mut wf = WorkflowModel::new("test");
        wf.nodes.push(NodeModel::new("w1", "Webhook", "n8n-nodes-base.webhook"));
        wf.nodes.push(NodeModel::new("i1", "Check", "n8n-nodes-base.if"));
        wf.nodes.push(NodeModel::new("s1", "Set", "n8n-nodes-base.set"));
        wf.connections.add(Connection::main("Webhook", 0, "Check"));
        wf
    }

    fn with_validator<R>(f: impl FnOnce(&OperationValidator) -> R) -> R {
        let catalog = StaticCatalog::builtin().unwrap();
        let ports = PortRegistry::default();
        let validator = OperationValidator::new(&catalog, &ports);
        f(&validator)
    }

    #[test]
    fn test_resolve_by_id_then_normalized_name() {
        let wf = workflow();
        assert_eq!(resolve_node(&wf, "s1"), Ok(2));
        assert_eq!(resolve_node(&wf, "  check "), Ok(1));
        assert_eq!(resolve_node(&wf, "nope"), Err(ValidationError::NodeNotFound("nope".into())));
    }

    #[test]
    fn test_resolve_ambiguous() {
        let mut wf = workflow();
        wf.nodes.push(NodeModel::new("s2", "set", "n8n-nodes-base.set"));
        wf.nodes.push(NodeModel::new("s3", "SET", "n8n-nodes-base.set"));
        assert_eq!(resolve_node(&wf, "Set"), Ok(2));
        assert_eq!(
            resolve_node(&wf, "sEt"),
            Err(ValidationError::AmbiguousNode {
                reference: "sEt".into(),
                count: 3
            })
        );
    }

    #[test]
    fn test_add_node_duplicate_name() {
        with_validator(|v| {
            let op = DiffOperation::AddNode {
                node: NewNode::new("check", "n8n-nodes-base.noOp"),
            };
            assert_eq!(v.validate(&workflow(), &op), Some(ValidationError::DuplicateNodeName("check".into())));
        });
    }

    #[test]
    fn test_add_node_generates_id() {
        with_validator(|v| {
            let op = DiffOperation::AddNode {
                node: NewNode::new("Fresh", "n8n-nodes-base.noOp"),
            };
            match v.plan(&workflow(), &op).unwrap() {
                Plan::AddNode(node) => assert!(!node.id.is_empty()),
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn test_update_rejects_id_change() {
        with_validator(|v| {
            let mut updates = Map::new();
            updates.insert("id".into(), json!("other"));
            let op = DiffOperation::UpdateNode {
                target: NodeRef::name("Set"),
                updates,
            };
            assert!(matches!(v.validate(&workflow(), &op), Some(ValidationError::InvalidUpdate(_))));
        });
    }

    #[test]
    fn test_update_rename_records_old_name() {
        with_validator(|v| {
            let mut updates = Map::new();
            updates.insert("name".into(), json!("Renamed"));
            updates.insert("parameters.mode".into(), json!("manual"));
            let op = DiffOperation::UpdateNode {
                target: NodeRef::id("s1"),
                updates,
            };
            match v.plan(&workflow(), &op).unwrap() {
                Plan::UpdateNode { node, renamed_from, .. } => {
                    assert_eq!(node.name, "Renamed");
                    assert_eq!(node.parameters, json!({"mode": "manual"}));
                    assert_eq!(renamed_from.as_deref(), Some("Set"));
                }
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn test_add_connection_branch() {
        with_validator(|v| {
            let op = DiffOperation::AddConnection {
                source: "Check".into(),
                target: "Set".into(),
                ports: PortSpec::branch("false"),
            };
            assert_eq!(v.plan(&workflow(), &op), Ok(Plan::AddConnection(Connection::main("Check", 1, "Set"))));
        });
    }

    #[test]
    fn test_add_connection_conflicting_port() {
        with_validator(|v| {
            let ports = PortSpec {
                source_index: Some(0),
                branch: Some("true".into()),
                ..Default::default()
            };
            let op = DiffOperation::AddConnection {
                source: "Check".into(),
                target: "Set".into(),
                ports,
            };
            assert_eq!(v.validate(&workflow(), &op), Some(ValidationError::ConflictingPort));
        });
    }

    #[test]
    fn test_add_duplicate_connection() {
        with_validator(|v| {
            let op = DiffOperation::AddConnection {
                source: "Webhook".into(),
                target: "Check".into(),
                ports: PortSpec::default(),
            };
            assert!(matches!(v.validate(&workflow(), &op), Some(ValidationError::ConnectionExists { .. })));
        });
    }

    #[test]
    fn test_remove_missing_connection_ignored() {
        with_validator(|v| {
            let op = DiffOperation::RemoveConnection {
                source: "Set".into(),
                target: "Gone".into(),
                ports: PortSpec::default(),
                ignore_errors: true,
            };
            assert_eq!(v.plan(&workflow(), &op), Ok(Plan::RemoveConnection(None)));
        });
    }

    #[test]
    fn test_rewire() {
        with_validator(|v| {
            let op = DiffOperation::RewireConnection {
                source: "Webhook".into(),
                from: "Check".into(),
                to: "Set".into(),
                ports: PortSpec::default(),
            };
            assert_eq!(
                v.plan(&workflow(), &op),
                Ok(Plan::Rewire {
                    remove: Connection::main("Webhook", 0, "Check"),
                    add: Connection::main("Webhook", 0, "Set"),
                })
            );
        });
    }

    #[test]
    fn test_activation_requires_trigger() {
        with_validator(|v| {
            assert_eq!(v.plan(&workflow(), &DiffOperation::ActivateWorkflow), Ok(Plan::Activate));

            let mut no_trigger = workflow();
            no_trigger.nodes.remove(0);
            assert_eq!(v.validate(&no_trigger, &DiffOperation::ActivateWorkflow), Some(ValidationError::NoActivatableTrigger));
            assert_eq!(v.validate(&no_trigger, &DiffOperation::DeactivateWorkflow), None);
        });
    }

    #[test]
    fn test_replace_connections_checks_endpoints() {
        with_validator(|v| {
            let op = DiffOperation::ReplaceConnections {
                connections: Connections::from_edges([Connection::main("Webhook", 0, "Ghost")]),
            };
            assert_eq!(v.validate(&workflow(), &op), Some(ValidationError::UnknownEndpoint("Ghost".into())));
        });
    }
}
