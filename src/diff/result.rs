use serde::{Deserialize, Serialize};

use crate::{ValidationError, diff::operation::OperationKind, model::WorkflowModel};

/// Diagnostic for one operation that could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    pub operation_index: usize,
    pub kind: OperationKind,
    pub message: String,
    #[serde(skip)]
    pub error: Option<ValidationError>,
}

impl OperationError {
    pub fn new(
        operation_index: usize,
        kind: OperationKind,
        error: ValidationError,
    ) -> Self {
        Self {
            operation_index,
            kind,
            message: error.to_string(),
            error: Some(error),
        }
    }
}

/// Outcome of one diff batch.
///
/// * atomic success: `success`, `workflow` and `operations_applied`.
/// * atomic failure: `success == false`, only `errors`; no workflow.
/// * best-effort: `success`, `workflow`, applied and failed counts with
///   per-operation `failures`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowModel>,
    pub operations_applied: usize,
    #[serde(default)]
    pub operations_failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<OperationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Indexes of the operations that were applied, in application order.
    #[serde(default)]
    pub applied: Vec<usize>,
    /// Indexes of the operations that failed.
    #[serde(default)]
    pub failed: Vec<usize>,
    #[serde(default)]
    pub should_activate: bool,
    #[serde(default)]
    pub should_deactivate: bool,
    pub message: String,
}

impl DiffResult {
    /// Result of an atomic batch aborted by `error`.
    pub fn aborted(error: OperationError) -> Self {
        Self {
            success: false,
            message: format!("operation {} ({}) failed: {}", error.operation_index, error.kind, error.message),
            operations_failed: 1,
            failed: vec![error.operation_index],
            errors: vec![error],
            ..Default::default()
        }
    }

    /// Whether the batch changed anything that should be written back.
    pub fn has_changes(&self) -> bool {
        self.success && self.operations_applied > 0
    }
}
