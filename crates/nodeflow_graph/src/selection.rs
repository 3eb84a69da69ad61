// SPDX-License-Identifier: MIT OR Apache-2.0
//! Selected nodes.

use crate::graph::Graph;
use crate::node::NodeId;

/// Selection actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// Select exactly this node
    ClickNode(NodeId),
    /// Add nodes to the selection
    SelectNodes(Vec<NodeId>),
    /// Deselect everything
    ClearSelection,
}

/// Ordered set of selected node IDs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: Vec<NodeId>,
}

impl Selection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected IDs in selection order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Whether a node is selected
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains(node_id)
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Apply an action
    pub fn transition(&self, action: SelectionAction) -> Self {
        match action {
            SelectionAction::ClickNode(node_id) => {
                if self.nodes.len() == 1 && self.contains(&node_id) {
                    self.clone()
                } else {
                    Self { nodes: vec![node_id] }
                }
            }
            SelectionAction::SelectNodes(node_ids) => {
                let mut nodes = self.nodes.clone();
                for node_id in node_ids {
                    if !nodes.contains(&node_id) {
                        nodes.push(node_id);
                    }
                }
                Self { nodes }
            }
            SelectionAction::ClearSelection => Self::new(),
        }
    }

    /// Drop IDs of nodes no longer in the graph
    pub fn prune(&self, graph: &Graph) -> Self {
        Self {
            nodes: self.nodes.iter().filter(|id| graph.contains(id)).cloned().collect(),
        }
    }
}
