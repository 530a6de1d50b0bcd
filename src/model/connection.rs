//! Connection map keyed by source node name and output type.
//!
//! On the wire a workflow stores its edges as
//! `{ source: { outputType: [[{ node, type, index }]] } }`, where the outer
//! array position is the source output index. [`Connection`] is the flat view
//! of one such edge.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Default output/input type.
pub const MAIN: &str = "main";

/// One target entry inside an output slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub node: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub index: usize,
}

/// Targets per output index.
pub type OutputSlots = Vec<Vec<ConnectionTarget>>;

/// A single directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub source_output: String,
    pub source_index: usize,
    pub target: String,
    pub target_input: String,
    pub target_index: usize,
}

impl Connection {
    /// A `main` to `main` edge between output `source_index` and input 0.
    pub fn main(
        source: impl Into<String>,
        source_index: usize,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_output: MAIN.to_string(),
            source_index,
            target: target.into(),
            target_input: MAIN.to_string(),
            target_index: 0,
        }
    }

    pub fn touches(
        &self,
        name: &str,
    ) -> bool {
        self.source == name || self.target == name
    }
}

impl fmt::Display for Connection {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}[{}:{}] -> {}[{}:{}]", self.source, self.source_output, self.source_index, self.target, self.target_input, self.target_index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Connections(BTreeMap<String, BTreeMap<String, OutputSlots>>);

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a connection map from flat edges, keeping their order per slot.
    pub fn from_edges<I: IntoIterator<Item = Connection>>(edges: I) -> Self {
        let mut map = Self::new();
        for edge in edges {
            map.add(edge);
        }
        map
    }

    /// All edges, ordered by source, output type, output index, then slot order.
    pub fn edges(&self) -> Vec<Connection> {
        let mut out = Vec::new();
        for (source, outputs) in self.0.iter() {
            for (output_type, slots) in outputs.iter() {
                for (source_index, targets) in slots.iter().enumerate() {
                    for t in targets {
                        out.push(Connection {
                            source: source.clone(),
                            source_output: output_type.clone(),
                            source_index,
                            target: t.node.clone(),
                            target_input: t.input_type.clone(),
                            target_index: t.index,
                        });
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.0.values().flat_map(|o| o.values()).flat_map(|s| s.iter()).map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(
        &self,
        edge: &Connection,
    ) -> bool {
        self.targets(&edge.source, &edge.source_output, edge.source_index)
            .map(|targets| targets.iter().any(|t| t.node == edge.target && t.input_type == edge.target_input && t.index == edge.target_index))
            .unwrap_or(false)
    }

    /// Targets connected to one output slot.
    pub fn targets(
        &self,
        source: &str,
        output_type: &str,
        source_index: usize,
    ) -> Option<&Vec<ConnectionTarget>> {
        self.0.get(source).and_then(|o| o.get(output_type)).and_then(|slots| slots.get(source_index))
    }

    /// Whether any edge leaves `source` from the given output slot.
    pub fn has_output(
        &self,
        source: &str,
        output_type: &str,
        source_index: usize,
    ) -> bool {
        self.targets(source, output_type, source_index).map(|t| !t.is_empty()).unwrap_or(false)
    }

    /// Add an edge. Returns `false` when it already exists.
    pub fn add(
        &mut self,
        edge: Connection,
    ) -> bool {
        if self.contains(&edge) {
            return false;
        }
        let slots = self.0.entry(edge.source).or_default().entry(edge.source_output).or_default();
        if slots.len() <= edge.source_index {
            slots.resize_with(edge.source_index + 1, Vec::new);
        }
        slots[edge.source_index].push(ConnectionTarget {
            node: edge.target,
            input_type: edge.target_input,
            index: edge.target_index,
        });
        true
    }

    /// Remove an edge. Returns `false` when it did not exist.
    pub fn remove(
        &mut self,
        edge: &Connection,
    ) -> bool {
        let removed = self.retain(|e| e != edge);
        !removed.is_empty()
    }

    /// Keep only edges matching `keep`, returning the removed ones.
    pub fn retain<F: FnMut(&Connection) -> bool>(
        &mut self,
        mut keep: F,
    ) -> Vec<Connection> {
        let (kept, removed): (Vec<_>, Vec<_>) = self.edges().into_iter().partition(|e| keep(e));
        if !removed.is_empty() {
            *self = Self::from_edges(kept);
        }
        removed
    }

    /// Remove every edge with `name` as source or target.
    pub fn remove_node(
        &mut self,
        name: &str,
    ) -> Vec<Connection> {
        self.retain(|e| !e.touches(name))
    }

    /// Rewrite endpoint names. All renames are applied simultaneously, so
    /// swaps and chains resolve against the names present before the call.
    pub fn rename_nodes(
        &mut self,
        renames: &HashMap<String, String>,
    ) -> usize {
        if renames.is_empty() {
            return 0;
        }
        let mut rewritten = 0;
        let edges = self
            .edges()
            .into_iter()
            .map(|mut e| {
                let mut changed = false;
                if let Some(new_name) = renames.get(&e.source) {
                    e.source = new_name.clone();
                    changed = true;
                }
                if let Some(new_name) = renames.get(&e.target) {
                    e.target = new_name.clone();
                    changed = true;
                }
                if changed {
                    rewritten += 1;
                }
                e
            })
            .collect::<Vec<_>>();
        *self = Self::from_edges(edges);
        rewritten
    }

    /// Every node name referenced as a source or target.
    pub fn referenced_nodes(&self) -> BTreeSet<String> {
        self.edges().into_iter().flat_map(|e| [e.source, e.target]).collect()
    }
}
