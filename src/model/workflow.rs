use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    FlowmendError, Result,
    model::{Connections, NodeModel, normalize_name},
};

static DOCUMENT_VALIDATOR: OnceLock<std::result::Result<jsonschema::Validator, String>> = OnceLock::new();

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeModel>,
    #[serde(default)]
    pub connections: Connections,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub active: bool,
}

impl WorkflowModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let value = serde_json::from_str::<Value>(s).map_err(|e| FlowmendError::Workflow(format!("{}", e)))?;
        Self::from_value(value)
    }

    /// Parse a workflow document, rejecting anything that does not have the
    /// shape of a workflow.
    pub fn from_value(value: Value) -> Result<Self> {
        let validator = DOCUMENT_VALIDATOR
            .get_or_init(|| jsonschema::validator_for(&Self::schema()).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| FlowmendError::Workflow(format!("invalid workflow schema: {}", e)))?;

        let problems: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
        if !problems.is_empty() {
            return Err(FlowmendError::Workflow(format!("malformed workflow document: {}", problems.join("; "))));
        }

        serde_json::from_value::<WorkflowModel>(value).map_err(|e| FlowmendError::Workflow(format!("{}", e)))
    }

    fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "nodes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "name": { "type": "string" },
                            "type": { "type": "string" },
                            "typeVersion": { "type": "number" },
                            "position": {
                                "type": "array",
                                "items": { "type": "number" },
                                "minItems": 2,
                                "maxItems": 2
                            },
                            "parameters": { "type": "object" },
                            "disabled": { "type": "boolean" }
                        },
                        "required": ["id", "name", "type"]
                    }
                },
                "connections": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "additionalProperties": {
                            "type": "array",
                            "items": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "node": { "type": "string" },
                                        "type": { "type": "string" },
                                        "index": { "type": "integer", "minimum": 0 }
                                    },
                                    "required": ["node", "type", "index"]
                                }
                            }
                        }
                    }
                },
                "settings": { "type": "object" },
                "tags": { "type": "array", "items": { "type": "string" } },
                "active": { "type": "boolean" }
            },
            "required": ["name"]
        })
    }

    /// Position of the node with this exact id.
    pub fn node_index_by_id(
        &self,
        id: &str,
    ) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Position of the node with this exact name.
    pub fn node_index_by_name(
        &self,
        name: &str,
    ) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn node_by_name(
        &self,
        name: &str,
    ) -> Option<&NodeModel> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Whether some node other than `except_id` already uses `name`
    /// (compared case and whitespace insensitively).
    pub fn name_taken(
        &self,
        name: &str,
        except_id: Option<&str>,
    ) -> bool {
        let wanted = normalize_name(name);
        self.nodes.iter().any(|n| Some(n.id.as_str()) != except_id && normalize_name(&n.name) == wanted)
    }

    pub fn has_tag(
        &self,
        tag: &str,
    ) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
