//! Error types for Flowmend.
//!
//! Fatal conditions are represented by [`FlowmendError`]. Recoverable,
//! per-operation validation failures are represented by [`ValidationError`]
//! and are only ever recorded in diff results, never propagated with `?`.

use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all fatal Flowmend operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FlowmendError {
    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Malformed workflow document.
    #[error("{0}")]
    Workflow(String),

    /// Node catalog loading errors.
    #[error("{0}")]
    Catalog(String),

    /// Breaking-change registry loading errors.
    #[error("{0}")]
    Registry(String),

    /// Workflow store errors.
    #[error("{0}")]
    Store(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<FlowmendError> for String {
    fn from(val: FlowmendError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for FlowmendError {
    fn from(error: std::io::Error) -> Self {
        FlowmendError::IoError(error.to_string())
    }
}

impl From<FlowmendError> for std::io::Error {
    fn from(val: FlowmendError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for FlowmendError {
    fn from(error: serde_json::Error) -> Self {
        FlowmendError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for FlowmendError {
    fn from(error: toml::de::Error) -> Self {
        FlowmendError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for FlowmendError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        FlowmendError::Workflow(error.to_string())
    }
}

/// Why a single diff operation could not be applied.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("node reference '{reference}' is ambiguous, it matches {count} nodes")]
    AmbiguousNode { reference: String, count: usize },

    #[error("operation is missing a node reference (nodeId or nodeName)")]
    MissingNodeReference,

    #[error("a node named '{0}' already exists")]
    DuplicateNodeName(String),

    #[error("a node with id '{0}' already exists")]
    DuplicateNodeId(String),

    #[error("invalid node: {0}")]
    InvalidNode(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("connection {from}[{output}:{index}] -> {to} already exists")]
    ConnectionExists {
        from: String,
        output: String,
        index: usize,
        to: String,
    },

    #[error("connection {from} -> {to} not found")]
    ConnectionNotFound { from: String, to: String },

    #[error("node '{node}' of type '{node_type}' does not support the '{selector}' port selector")]
    UnsupportedSelector {
        node: String,
        node_type: String,
        selector: String,
    },

    #[error("invalid branch '{0}', expected 'true' or 'false'")]
    InvalidBranch(String),

    #[error("case {case} is out of range for node '{node}' which has {outputs} outputs")]
    CaseOutOfRange { node: String, case: usize, outputs: usize },

    #[error("sourceIndex and a branch/case selector cannot be combined")]
    ConflictingPort,

    #[error("connection endpoint '{0}' does not reference an existing node")]
    UnknownEndpoint(String),

    #[error("workflow has no enabled trigger node that can activate it")]
    NoActivatableTrigger,

    #[error("workflow name cannot be empty")]
    EmptyWorkflowName,

    #[error("dependency failed: operation #{index} on node '{node}' was not applied")]
    DependencyFailed { index: usize, node: String },
}
