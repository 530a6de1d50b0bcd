//! Structural clean-up of node parameters after a diff batch.
//!
//! Edits routinely leave condition blocks half-formed: shorthand operators,
//! stale `singleValue` flags, or rules added without their option defaults.
//! Sanitizing is idempotent.

mod conditions;

use serde_json::Value;
use tracing::trace;

use crate::{
    catalog::{base_name, normalize_node_type},
    common::Version,
    model::NodeModel,
};

pub use conditions::{CONDITION_OPTIONS_VERSION, complete_options, is_unary, normalize_operator, normalize_operators};

/// Node types whose condition blocks carry an `options` object, with the
/// first type version that requires it.
const VERSIONED_CONDITIONALS: &[(&str, &[u32])] = &[("if", &[2, 2]), ("filter", &[2, 2]), ("switch", &[3, 2])];

fn options_required(node: &NodeModel) -> bool {
    let node_type = normalize_node_type(&node.node_type);
    let base = base_name(&node_type);
    VERSIONED_CONDITIONALS.iter().any(|(name, min)| *name == base && node.version() >= Version::new(min.to_vec()))
}

/// Condition blocks of a node: `parameters.conditions` and each
/// `parameters.rules.values[*].conditions`.
fn condition_blocks(parameters: &mut Value) -> Vec<&mut Value> {
    let mut blocks = Vec::new();
    let Some(params) = parameters.as_object_mut() else {
        return blocks;
    };
    let mut rules = None;
    for (key, value) in params.iter_mut() {
        match key.as_str() {
            "conditions" if value.is_object() => blocks.push(value),
            "rules" => rules = Some(value),
            _ => {}
        }
    }
    if let Some(values) = rules.and_then(|r| r.get_mut("values")).and_then(Value::as_array_mut) {
        blocks.extend(values.iter_mut().filter_map(|rule| rule.get_mut("conditions")).filter(|c| c.is_object()));
    }
    blocks
}

/// Sanitize `node` in place. Returns whether anything changed.
pub fn sanitize_node(node: &mut NodeModel) -> bool {
    let with_options = options_required(node);
    let mut changed = false;
    for block in condition_blocks(&mut node.parameters) {
        changed |= normalize_operators(block);
        if with_options {
            changed |= complete_options(block);
        }
    }
    if changed {
        trace!("sanitize::sanitize_node({})", node.name);
    }
    changed
}

/// Sanitized copy of `node`.
pub fn sanitize(node: &NodeModel) -> NodeModel {
    let mut node = node.clone();
    sanitize_node(&mut node);
    node
}
