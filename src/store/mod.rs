//! Storage of workflow documents.
//!
//! The pipeline itself never persists anything; the [`Engine`](crate::Engine)
//! fetches a snapshot before a batch and writes the result back through a
//! [`WorkflowStore`].

mod data;
mod mem;

use crate::{Result, model::WorkflowModel};

pub use data::StoredWorkflow;
pub use mem::MemStore;

/// Fetch/persist access to workflow documents.
pub trait WorkflowStore: Send + Sync {
    /// Checks if a workflow with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Load the current snapshot of a workflow.
    fn fetch(
        &self,
        id: &str,
    ) -> Result<WorkflowModel>;

    /// Store `workflow` as the current snapshot for `id`. Returns whether an
    /// existing snapshot was replaced.
    fn persist(
        &self,
        id: &str,
        workflow: &WorkflowModel,
    ) -> Result<bool>;

    /// Deletes a workflow by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}
