//! Diff operations: the closed set of edits that can be applied to a workflow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Connections, MAIN};

fn default_output() -> String {
    MAIN.to_string()
}

fn default_type_version() -> f64 {
    1.0
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A batch of operations and how to apply it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRequest {
    pub operations: Vec<DiffOperation>,
    /// Skip and report invalid operations instead of aborting the batch.
    /// Falls back to the engine's configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
    /// Run the batch without the result being persisted.
    #[serde(default)]
    pub validate_only: bool,
}

impl DiffRequest {
    pub fn new(operations: Vec<DiffOperation>) -> Self {
        Self {
            operations,
            ..Default::default()
        }
    }

    pub fn continue_on_error(
        mut self,
        continue_on_error: bool,
    ) -> Self {
        self.continue_on_error = Some(continue_on_error);
        self
    }

    pub fn validate_only(
        mut self,
        validate_only: bool,
    ) -> Self {
        self.validate_only = validate_only;
        self
    }
}

/// Reference to an existing node by id or by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

impl NodeRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            node_id: Some(id.into()),
            node_name: None,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            node_id: None,
            node_name: Some(name.into()),
        }
    }

    /// The reference as given, for diagnostics.
    pub fn label(&self) -> String {
        self.node_id.clone().or_else(|| self.node_name.clone()).unwrap_or_default()
    }
}

/// Node definition carried by `addNode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_type_version")]
    pub type_version: f64,
    #[serde(default)]
    pub position: [f64; 2],
    #[serde(default = "empty_object")]
    pub parameters: Value,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
}

impl NewNode {
    pub fn new(
        name: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type: node_type.into(),
            type_version: default_type_version(),
            position: [0.0, 0.0],
            parameters: empty_object(),
            disabled: false,
            credentials: None,
            on_error: None,
            webhook_id: None,
        }
    }

    pub fn with_parameters(
        mut self,
        parameters: Value,
    ) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_version(
        mut self,
        version: f64,
    ) -> Self {
        self.type_version = version;
        self
    }
}

/// Endpoints and port selection shared by the connection operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    #[serde(default = "default_output")]
    pub source_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
    /// `"true"` / `"false"` for if-shaped sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Output number for switch-shaped sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<usize>,
}

impl Default for PortSpec {
    fn default() -> Self {
        Self {
            source_output: default_output(),
            target_input: None,
            source_index: None,
            target_index: None,
            branch: None,
            case: None,
        }
    }
}

impl PortSpec {
    pub fn branch(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            ..Default::default()
        }
    }

    pub fn case(case: usize) -> Self {
        Self {
            case: Some(case),
            ..Default::default()
        }
    }

    pub fn index(source_index: usize) -> Self {
        Self {
            source_index: Some(source_index),
            ..Default::default()
        }
    }

    pub fn target_input(&self) -> &str {
        self.target_input.as_deref().unwrap_or(&self.source_output)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DiffOperation {
    // node operations
    AddNode {
        node: NewNode,
    },
    RemoveNode {
        #[serde(flatten)]
        target: NodeRef,
    },
    /// Set dotted paths on a node, e.g. `{"name": "New", "parameters.url": "..."}`.
    UpdateNode {
        #[serde(flatten)]
        target: NodeRef,
        updates: Map<String, Value>,
    },
    MoveNode {
        #[serde(flatten)]
        target: NodeRef,
        position: [f64; 2],
    },
    EnableNode {
        #[serde(flatten)]
        target: NodeRef,
    },
    DisableNode {
        #[serde(flatten)]
        target: NodeRef,
    },

    // connection operations
    AddConnection {
        source: String,
        target: String,
        #[serde(flatten)]
        ports: PortSpec,
    },
    RemoveConnection {
        source: String,
        target: String,
        #[serde(flatten)]
        ports: PortSpec,
        #[serde(default)]
        ignore_errors: bool,
    },
    /// Move an edge leaving `source` from target `from` to target `to`.
    RewireConnection {
        source: String,
        from: String,
        to: String,
        #[serde(flatten)]
        ports: PortSpec,
    },
    CleanStaleConnections {
        #[serde(default)]
        dry_run: bool,
    },
    ReplaceConnections {
        connections: Connections,
    },

    // metadata operations
    UpdateSettings {
        settings: Map<String, Value>,
    },
    UpdateName {
        name: String,
    },
    AddTag {
        tag: String,
    },
    RemoveTag {
        tag: String,
    },

    // activation operations
    ActivateWorkflow,
    DeactivateWorkflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum OperationKind {
    AddNode,
    RemoveNode,
    UpdateNode,
    MoveNode,
    EnableNode,
    DisableNode,
    AddConnection,
    RemoveConnection,
    RewireConnection,
    CleanStaleConnections,
    ReplaceConnections,
    UpdateSettings,
    UpdateName,
    AddTag,
    RemoveTag,
    ActivateWorkflow,
    DeactivateWorkflow,
}

impl DiffOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            DiffOperation::AddNode { .. } => OperationKind::AddNode,
            DiffOperation::RemoveNode { .. } => OperationKind::RemoveNode,
            DiffOperation::UpdateNode { .. } => OperationKind::UpdateNode,
            DiffOperation::MoveNode { .. } => OperationKind::MoveNode,
            DiffOperation::EnableNode { .. } => OperationKind::EnableNode,
            DiffOperation::DisableNode { .. } => OperationKind::DisableNode,
            DiffOperation::AddConnection { .. } => OperationKind::AddConnection,
            DiffOperation::RemoveConnection { .. } => OperationKind::RemoveConnection,
            DiffOperation::RewireConnection { .. } => OperationKind::RewireConnection,
            DiffOperation::CleanStaleConnections { .. } => OperationKind::CleanStaleConnections,
            DiffOperation::ReplaceConnections { .. } => OperationKind::ReplaceConnections,
            DiffOperation::UpdateSettings { .. } => OperationKind::UpdateSettings,
            DiffOperation::UpdateName { .. } => OperationKind::UpdateName,
            DiffOperation::AddTag { .. } => OperationKind::AddTag,
            DiffOperation::RemoveTag { .. } => OperationKind::RemoveTag,
            DiffOperation::ActivateWorkflow => OperationKind::ActivateWorkflow,
            DiffOperation::DeactivateWorkflow => OperationKind::DeactivateWorkflow,
        }
    }

    /// Whether the operation belongs to the first (node) pass.
    pub fn is_node_operation(&self) -> bool {
        matches!(
            self,
            DiffOperation::AddNode { .. }
                | DiffOperation::RemoveNode { .. }
                | DiffOperation::UpdateNode { .. }
                | DiffOperation::MoveNode { .. }
                | DiffOperation::EnableNode { .. }
                | DiffOperation::DisableNode { .. }
        )
    }

    /// Name or id of the node a node operation targets.
    pub fn node_label(&self) -> Option<String> {
        match self {
            DiffOperation::AddNode { node } => Some(node.name.clone()),
            DiffOperation::RemoveNode { target }
            | DiffOperation::UpdateNode { target, .. }
            | DiffOperation::MoveNode { target, .. }
            | DiffOperation::EnableNode { target }
            | DiffOperation::DisableNode { target } => Some(target.label()),
            _ => None,
        }
    }

    /// Node references made by a connection operation.
    pub fn endpoints(&self) -> Vec<&str> {
        match self {
            DiffOperation::AddConnection { source, target, .. } | DiffOperation::RemoveConnection { source, target, .. } => vec![source.as_str(), target.as_str()],
            DiffOperation::RewireConnection { source, from, to, .. } => vec![source.as_str(), from.as_str(), to.as_str()],
            _ => Vec::new(),
        }
    }
}
