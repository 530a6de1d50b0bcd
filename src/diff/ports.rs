//! Resolution of symbolic port selectors to output indexes.
//!
//! `addConnection` may name a source port by branch (`"true"`/`"false"`) or by
//! case number instead of a raw index. Which selectors a node understands
//! depends on its shape, so each shape registers a [`PortResolver`].

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

use crate::{
    ValidationError,
    catalog::normalize_node_type,
    common::path::get_path,
    model::NodeModel,
};

/// Outputs a switch in expression mode has when `numberOutputs` is unset.
const DEFAULT_EXPRESSION_OUTPUTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelector {
    Branch(String),
    Case(usize),
}

impl fmt::Display for PortSelector {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            PortSelector::Branch(b) => write!(f, "branch={}", b),
            PortSelector::Case(c) => write!(f, "case={}", c),
        }
    }
}

pub trait PortResolver: Send + Sync {
    /// Map a selector to an output index of `node`.
    fn resolve(
        &self,
        node: &NodeModel,
        selector: &PortSelector,
    ) -> Result<usize, ValidationError>;
}

fn unsupported(
    node: &NodeModel,
    selector: &PortSelector,
) -> ValidationError {
    ValidationError::UnsupportedSelector {
        node: node.name.clone(),
        node_type: node.node_type.clone(),
        selector: selector.to_string(),
    }
}

/// If-shaped nodes: output 0 is the true branch, output 1 the false branch.
pub struct BranchPorts;

impl PortResolver for BranchPorts {
    fn resolve(
        &self,
        node: &NodeModel,
        selector: &PortSelector,
    ) -> Result<usize, ValidationError> {
        match selector {
            PortSelector::Branch(b) => match b.trim().to_lowercase().as_str() {
                "true" => Ok(0),
                "false" => Ok(1),
                _ => Err(ValidationError::InvalidBranch(b.clone())),
            },
            PortSelector::Case(_) => Err(unsupported(node, selector)),
        }
    }
}

/// Switch-shaped nodes: output N is case N.
pub struct CasePorts;

impl CasePorts {
    /// Number of outputs the switch currently declares.
    pub fn output_count(node: &NodeModel) -> usize {
        let params = &node.parameters;
        if get_path(params, "mode").and_then(Value::as_str) == Some("expression") {
            return get_path(params, "numberOutputs").and_then(Value::as_u64).map(|n| n as usize).unwrap_or(DEFAULT_EXPRESSION_OUTPUTS);
        }
        let rules = get_path(params, "rules.values")
            .or_else(|| get_path(params, "rules.rules"))
            .and_then(Value::as_array)
            .map(|rules| rules.len())
            .unwrap_or(0);
        let fallback = match get_path(params, "options.fallbackOutput").and_then(Value::as_str) {
            Some("extra") => 1,
            _ => 0,
        };
        rules + fallback
    }
}

impl PortResolver for CasePorts {
    fn resolve(
        &self,
        node: &NodeModel,
        selector: &PortSelector,
    ) -> Result<usize, ValidationError> {
        match selector {
            PortSelector::Case(case) => {
                let outputs = Self::output_count(node);
                if *case < outputs {
                    Ok(*case)
                } else {
                    Err(ValidationError::CaseOutOfRange {
                        node: node.name.clone(),
                        case: *case,
                        outputs,
                    })
                }
            }
            PortSelector::Branch(_) => Err(unsupported(node, selector)),
        }
    }
}

/// Port resolvers keyed by package-qualified node type.
#[derive(Clone)]
pub struct PortRegistry {
    resolvers: HashMap<String, Arc<dyn PortResolver>>,
}

impl Default for PortRegistry {
    fn default() -> Self {
        let mut registry = Self { resolvers: HashMap::new() };
        registry.register("if", Arc::new(BranchPorts));
        registry.register("filter", Arc::new(BranchPorts));
        registry.register("switch", Arc::new(CasePorts));
        registry
    }
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        node_type: &str,
        resolver: Arc<dyn PortResolver>,
    ) {
        self.resolvers.insert(normalize_node_type(node_type), resolver);
    }

    pub fn resolve(
        &self,
        node: &NodeModel,
        selector: &PortSelector,
    ) -> Result<usize, ValidationError> {
        match self.resolvers.get(&normalize_node_type(&node.node_type)) {
            Some(resolver) => resolver.resolve(node, selector),
            None => Err(unsupported(node, selector)),
        }
    }
}
