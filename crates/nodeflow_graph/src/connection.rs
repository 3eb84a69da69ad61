// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) records stored on each node.
//!
//! Every edge is stored twice: once in the output node's `outputs` and once in
//! the input node's `inputs`. Only [`crate::Graph::link`] and
//! [`crate::Graph::unlink`] edit both sides.

use crate::node::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One end of an edge: a port on a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRef {
    /// Node the port belongs to
    pub node_id: NodeId,
    /// Port name
    pub port_name: String,
}

impl PortRef {
    /// Create a port reference
    pub fn new(node_id: impl Into<NodeId>, port_name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            port_name: port_name.into(),
        }
    }
}

/// Which side of a node a port is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransputType {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Edge lists by local port name
pub type EdgeMap = IndexMap<String, Vec<PortRef>>;

/// Edge records of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    /// Incoming edges: local input port -> remote output ports
    #[serde(default)]
    pub inputs: EdgeMap,
    /// Outgoing edges: local output port -> remote input ports
    #[serde(default)]
    pub outputs: EdgeMap,
}

impl Connections {
    /// Whether the node has no edges at all
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Edge list of one side
    pub fn side(&self, side: TransputType) -> &EdgeMap {
        match side {
            TransputType::Input => &self.inputs,
            TransputType::Output => &self.outputs,
        }
    }

    /// Output port feeding an input port
    pub fn input(&self, port_name: &str) -> Option<&PortRef> {
        self.inputs.get(port_name).and_then(|edges| edges.first())
    }

    /// Whether an input port has an incoming edge
    pub fn is_input_connected(&self, port_name: &str) -> bool {
        self.input(port_name).is_some()
    }

    /// All remote ports referenced from this node
    pub fn references(&self) -> impl Iterator<Item = &PortRef> {
        self.inputs.values().chain(self.outputs.values()).flatten()
    }

    /// Drop every edge pointing at `node_id`
    pub(crate) fn strip_node(&mut self, node_id: &NodeId) {
        retain_edges(&mut self.inputs, |r| &r.node_id != node_id);
        retain_edges(&mut self.outputs, |r| &r.node_id != node_id);
    }

    /// Point every edge referencing `from` at `to`
    pub(crate) fn rename_node(&mut self, from: &NodeId, to: &NodeId) {
        for port_ref in self.inputs.values_mut().chain(self.outputs.values_mut()).flatten() {
            if &port_ref.node_id == from {
                port_ref.node_id = to.clone();
            }
        }
    }
}

/// Append an edge record under a local port
pub(crate) fn push_edge(edges: &mut EdgeMap, port_name: &str, remote: PortRef) {
    edges.entry(port_name.to_string()).or_default().push(remote);
}

/// Remove an edge record under a local port, dropping the port key once empty
pub(crate) fn remove_edge(edges: &mut EdgeMap, port_name: &str, remote: &PortRef) {
    let Some(list) = edges.get_mut(port_name) else {
        return;
    };
    list.retain(|r| r != remote);
    if list.is_empty() {
        edges.shift_remove(port_name);
    }
}

fn retain_edges(edges: &mut EdgeMap, mut keep: impl FnMut(&PortRef) -> bool) {
    for list in edges.values_mut() {
        list.retain(&mut keep);
    }
    edges.retain(|_, list| !list.is_empty());
}
