use tracing::trace;

use crate::{
    FlowmendError, Result,
    common::MemCache,
    model::WorkflowModel,
    store::{StoredWorkflow, WorkflowStore},
    utils,
};

/// Default initial capacity of the store.
const DEFAULT_CAPACITY: usize = 1024;

/// In-memory [`WorkflowStore`]. Snapshots are never evicted.
#[derive(Clone)]
pub struct MemStore {
    workflows: MemCache<String, StoredWorkflow>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MemStore {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            workflows: MemCache::new(initial_capacity),
        }
    }

    /// The raw stored record, timestamps included.
    pub fn find(
        &self,
        id: &str,
    ) -> Result<StoredWorkflow> {
        self.workflows.get(&id.to_string()).ok_or_else(|| FlowmendError::Store(format!("workflow '{}' not found", id)))
    }
}

impl WorkflowStore for MemStore {
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.workflows.contains(&id.to_string()))
    }

    fn fetch(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        trace!("store::fetch({})", id);
        self.find(id)?.workflow()
    }

    fn persist(
        &self,
        id: &str,
        workflow: &WorkflowModel,
    ) -> Result<bool> {
        trace!("store::persist({})", id);
        if id.is_empty() {
            return Err(FlowmendError::Store("missing id for workflow".into()));
        }
        match self.find(id) {
            Ok(m) => {
                let data = StoredWorkflow::new(id, workflow, m.create_time, utils::time_millis())?;
                self.workflows.set(id.to_string(), data);
                Ok(true)
            }
            Err(_) => {
                let data = StoredWorkflow::new(id, workflow, utils::time_millis(), 0)?;
                self.workflows.set(id.to_string(), data);
                Ok(false)
            }
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let existed = self.workflows.contains(&id.to_string());
        self.workflows.remove(&id.to_string());
        Ok(existed)
    }
}
