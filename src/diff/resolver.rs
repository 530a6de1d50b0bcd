//! Keeps connection endpoints in step with node renames.

use std::collections::HashMap;

use tracing::debug;

use crate::model::WorkflowModel;

/// Renames recorded during one diff batch, keyed by node id.
///
/// Only the name a node had when the batch started is kept, so chained
/// renames (`A -> B -> C`) collapse into one rewrite `A -> C`.
#[derive(Debug, Default)]
pub struct ReferenceResolver {
    original_names: HashMap<String, String>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rename(
        &mut self,
        node_id: &str,
        old_name: &str,
    ) {
        self.original_names.entry(node_id.to_string()).or_insert_with(|| old_name.to_string());
    }

    /// Name of the node when the batch started, if it was renamed since.
    pub fn original_name(
        &self,
        node_id: &str,
    ) -> Option<&str> {
        self.original_names.get(node_id).map(String::as_str)
    }

    pub fn forget(
        &mut self,
        node_id: &str,
    ) {
        self.original_names.remove(node_id);
    }

    pub fn is_empty(&self) -> bool {
        self.original_names.is_empty()
    }

    /// Rewrite every endpoint that still uses an original name to the
    /// node's current name. Returns the number of edges rewritten.
    pub fn resolve(
        &self,
        workflow: &mut WorkflowModel,
    ) -> usize {
        if self.is_empty() {
            return 0;
        }
        let renames: HashMap<String, String> = self
            .original_names
            .iter()
            .filter_map(|(id, old)| {
                let node = workflow.nodes.iter().find(|n| &n.id == id)?;
                (node.name != *old).then(|| (old.clone(), node.name.clone()))
            })
            .collect();
        if renames.is_empty() {
            return 0;
        }

        let rewritten = workflow.connections.rename_nodes(&renames);
        debug!("resolver::resolve renames={} rewritten={}", renames.len(), rewritten);
        rewritten
    }
}
