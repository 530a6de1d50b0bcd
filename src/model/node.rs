use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::Version;

/// Value of `onError` that routes failures to the node's second `main` output.
pub const ERROR_OUTPUT_MODE: &str = "continueErrorOutput";

fn is_false(v: &bool) -> bool {
    !*v
}

fn default_type_version() -> f64 {
    1.0
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeModel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_type_version")]
    pub type_version: f64,
    #[serde(default)]
    pub position: [f64; 2],
    #[serde(default = "empty_object")]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NodeModel {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: node_type.into(),
            type_version: default_type_version(),
            position: [0.0, 0.0],
            parameters: empty_object(),
            disabled: false,
            credentials: None,
            on_error: None,
            webhook_id: None,
            notes: None,
        }
    }

    pub fn with_version(
        mut self,
        version: f64,
    ) -> Self {
        self.type_version = version;
        self
    }

    pub fn with_parameters(
        mut self,
        parameters: Value,
    ) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn version(&self) -> Version {
        Version::from_f64(self.type_version)
    }

    /// Whether errors of this node are routed to an error output.
    pub fn routes_errors(&self) -> bool {
        self.on_error.as_deref() == Some(ERROR_OUTPUT_MODE)
    }
}

/// Lowercase a node name and collapse whitespace runs, for reference lookups.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
