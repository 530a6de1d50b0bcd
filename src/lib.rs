//! # Flowmend
//!
//! Flowmend applies incremental edits to node-graph workflow documents and
//! repairs them. It is designed to be embedded in tools that modify workflows
//! on behalf of users or agents.
//!
//! ## Core Features
//!
//! - **Diff Engine**: Two-pass application of a batch of edits, atomic or best-effort, with rename tracking
//! - **Structural Sanitizer**: Normalizes conditional-node operator and option structures
//! - **Breaking-Change Analysis**: Ranked property-level changes between node versions, from a registry and schema diffs
//! - **Migration**: Applies the automatic part of a version upgrade and lists the manual steps
//! - **Autofix**: Confidence-ranked fix proposals, optionally applied through the diff engine
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowmend::{DiffOperation, DiffRequest, EngineBuilder, WorkflowModel};
//!
//! let engine = EngineBuilder::new().build()?;
//!
//! let workflow = WorkflowModel::from_json(json_str)?;
//! engine.deploy("wf1", &workflow)?;
//!
//! let request = DiffRequest::new(vec![DiffOperation::ActivateWorkflow]).continue_on_error(true);
//! let result = engine.update_workflow("wf1", &request)?;
//! ```

pub mod autofix;
pub mod breaking;
mod builder;
pub mod catalog;
mod common;
mod config;
pub mod diff;
mod engine;
mod error;
mod model;
pub mod sanitize;
pub mod store;
mod utils;

pub use builder::EngineBuilder;
pub use common::{Version, path};
pub use config::{AutofixDefaults, Config, DiffConfig, StoreConfig};
pub use engine::Engine;
pub use error::{FlowmendError, ValidationError};
pub use model::*;

pub use autofix::{AutofixConfig, AutofixResult, Confidence, FixOperation, FixType};
pub use breaking::{BreakingChangeAnalyzer, BreakingChangeRegistry, DetectedChange, VersionUpgradeAnalysis};
pub use diff::{DiffEngine, DiffOperation, DiffRequest, DiffResult};

/// Result type alias for Flowmend operations.
pub type Result<T> = std::result::Result<T, FlowmendError>;
