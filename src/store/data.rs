use serde::{Deserialize, Serialize};

use crate::{FlowmendError, Result, model::WorkflowModel};

/// A persisted workflow snapshot.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StoredWorkflow {
    pub id: String,
    pub name: String,
    /// The workflow document as JSON text.
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl StoredWorkflow {
    pub fn new(
        id: &str,
        workflow: &WorkflowModel,
        create_time: i64,
        update_time: i64,
    ) -> Result<Self> {
        let data = serde_json::to_string(workflow).map_err(|e| FlowmendError::Store(e.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            name: workflow.name.clone(),
            data,
            create_time,
            update_time,
        })
    }

    /// Parse the stored document. A snapshot that no longer parses is a
    /// corrupt document, not a missing one.
    pub fn workflow(&self) -> Result<WorkflowModel> {
        let mut workflow = WorkflowModel::from_json(&self.data)?;
        if workflow.id.is_none() {
            workflow.id = Some(self.id.clone());
        }
        Ok(workflow)
    }
}
