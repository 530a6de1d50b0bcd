//! Incremental edits to a workflow document.

mod engine;
mod operation;
mod ports;
mod resolver;
mod result;
mod validator;

pub use engine::DiffEngine;
pub use operation::{DiffOperation, DiffRequest, NewNode, NodeRef, OperationKind, PortSpec};
pub use ports::{BranchPorts, CasePorts, PortRegistry, PortResolver, PortSelector};
pub use resolver::ReferenceResolver;
pub use result::{DiffResult, OperationError};
pub use validator::{OperationValidator, Plan, resolve_node, resolve_node_ref};
