// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure: nodes by ID, each carrying its own edge records.

use crate::connection::{push_edge, remove_edge, PortRef};
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A node graph.
///
/// Nodes sit behind [`Arc`] so a snapshot cloned from another shares every
/// node it does not touch. [`Graph::node_mut`] copies a node on first write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Graph {
    nodes: IndexMap<NodeId, Arc<Node>>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph, replacing any node with the same ID.
    ///
    /// Edge records are not checked or cleaned up.
    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), Arc::new(node));
        id
    }

    /// Remove a node without touching edges elsewhere
    pub(crate) fn take(&mut self, node_id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.shift_remove(node_id)
    }

    /// Remove a node and every edge record referencing it
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        let removed = self.take(node_id)?;
        let referencing: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.connections.references().any(|r| &r.node_id == node_id))
            .map(|n| n.id.clone())
            .collect();
        for id in referencing {
            if let Some(node) = self.node_mut(&id) {
                node.connections.strip_node(node_id);
            }
        }
        Some(Arc::unwrap_or_clone(removed))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id).map(Arc::as_ref)
    }

    /// Get a mutable node by ID, unsharing it from other snapshots
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id).map(Arc::make_mut)
    }

    /// Whether a node exists
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().map(Arc::as_ref)
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes flagged as root
    pub fn root_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.root)
    }

    /// Whether both snapshots hold the very same allocation for a node
    pub fn shares_node(&self, other: &Graph, node_id: &NodeId) -> bool {
        match (self.nodes.get(node_id), other.nodes.get(node_id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// All edges as `(output, input)` pairs, read from the output side
    pub fn edges(&self) -> impl Iterator<Item = (PortRef, &PortRef)> {
        self.nodes().flat_map(|node| {
            node.connections.outputs.iter().flat_map(move |(port, targets)| {
                targets
                    .iter()
                    .map(move |target| (PortRef::new(node.id.clone(), port.clone()), target))
            })
        })
    }

    /// Get the number of edges
    pub fn connection_count(&self) -> usize {
        self.nodes()
            .map(|n| n.connections.outputs.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Record an edge on both of its endpoints.
    ///
    /// Returns false, leaving the graph untouched, if either node is missing.
    pub fn link(&mut self, output: &PortRef, input: &PortRef) -> bool {
        if !self.contains(&output.node_id) || !self.contains(&input.node_id) {
            return false;
        }
        if let Some(node) = self.node_mut(&output.node_id) {
            push_edge(&mut node.connections.outputs, &output.port_name, input.clone());
        }
        if let Some(node) = self.node_mut(&input.node_id) {
            push_edge(&mut node.connections.inputs, &input.port_name, output.clone());
        }
        true
    }

    /// Remove an edge from both of its endpoints. Absent edges are ignored.
    pub fn unlink(&mut self, output: &PortRef, input: &PortRef) {
        if self.has_edge(output, input) {
            if let Some(node) = self.node_mut(&output.node_id) {
                remove_edge(&mut node.connections.outputs, &output.port_name, input);
            }
        }
        let input_side = self
            .node(&input.node_id)
            .and_then(|n| n.connections.inputs.get(&input.port_name))
            .is_some_and(|edges| edges.contains(output));
        if input_side {
            if let Some(node) = self.node_mut(&input.node_id) {
                remove_edge(&mut node.connections.inputs, &input.port_name, output);
            }
        }
    }

    /// Whether the output side records an edge
    pub fn has_edge(&self, output: &PortRef, input: &PortRef) -> bool {
        self.node(&output.node_id)
            .and_then(|n| n.connections.outputs.get(&output.port_name))
            .is_some_and(|edges| edges.contains(input))
    }

    /// Whether following output edges from `start` leads back to `start`
    pub fn leads_back_to(&self, start: &NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(node_id) = stack.pop() {
            let Some(node) = self.node(node_id) else {
                continue;
            };
            for target in node.connections.outputs.values().flatten() {
                if &target.node_id == start {
                    return true;
                }
                if visited.insert(&target.node_id) {
                    stack.push(&target.node_id);
                }
            }
        }

        false
    }

    /// Rename a node in place and rewrite every edge record pointing at it
    pub(crate) fn rename_node(&mut self, from: &NodeId, to: NodeId) {
        let Some(index) = self.nodes.get_index_of(from) else {
            return;
        };
        let Some(node) = self.take(from) else {
            return;
        };
        let mut node = Arc::unwrap_or_clone(node);
        node.id = to.clone();
        node.connections.rename_node(from, &to);

        let referencing: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.connections.references().any(|r| &r.node_id == from))
            .map(|n| n.id.clone())
            .collect();
        for id in referencing {
            if let Some(other) = self.node_mut(&id) {
                other.connections.rename_node(from, &to);
            }
        }

        self.nodes.shift_insert(index, to, Arc::new(node));
    }

    /// Edge records without a matching record on the other endpoint.
    ///
    /// Empty for any graph built through the mutator.
    pub fn asymmetric_edges(&self) -> Vec<(PortRef, PortRef)> {
        let mut broken = Vec::new();
        for node in self.nodes() {
            for (port, targets) in &node.connections.outputs {
                let here = PortRef::new(node.id.clone(), port.clone());
                for target in targets {
                    let mirrored = self
                        .node(&target.node_id)
                        .and_then(|n| n.connections.inputs.get(&target.port_name))
                        .is_some_and(|edges| edges.contains(&here));
                    if !mirrored {
                        broken.push((here.clone(), target.clone()));
                    }
                }
            }
            for (port, sources) in &node.connections.inputs {
                let here = PortRef::new(node.id.clone(), port.clone());
                for source in sources {
                    if !self.has_edge(source, &here) {
                        broken.push((source.clone(), here.clone()));
                    }
                }
            }
        }
        broken
    }
}

impl FromIterator<Node> for Graph {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut graph = Graph::new();
        for node in iter {
            graph.insert(node);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(ids: &[&str]) -> Graph {
        ids.iter()
            .map(|id| Node::new(NodeId::from(*id), "t", 0.0, 0.0))
            .collect()
    }

    #[test]
    fn test_link_and_unlink_are_symmetric() {
        let mut graph = graph_of(&["a", "b"]);
        let out = PortRef::new("a", "out");
        let inp = PortRef::new("b", "in");

        assert!(graph.link(&out, &inp));
        assert!(graph.has_edge(&out, &inp));
        assert_eq!(graph.node(&"b".into()).unwrap().connections.input("in"), Some(&out));
        assert!(graph.asymmetric_edges().is_empty());
        assert_eq!(graph.connection_count(), 1);

        graph.unlink(&out, &inp);
        assert!(graph.node(&"a".into()).unwrap().connections.is_empty());
        assert!(graph.node(&"b".into()).unwrap().connections.is_empty());
    }

    #[test]
    fn test_link_missing_node_is_refused() {
        let mut graph = graph_of(&["a"]);
        let before = graph.clone();
        assert!(!graph.link(&PortRef::new("a", "out"), &PortRef::new("ghost", "in")));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_self_link() {
        let mut graph = graph_of(&["a"]);
        let out = PortRef::new("a", "out");
        let inp = PortRef::new("a", "in");
        graph.link(&out, &inp);

        let node = graph.node(&"a".into()).unwrap();
        assert_eq!(node.connections.outputs["out"], vec![inp.clone()]);
        assert_eq!(node.connections.inputs["in"], vec![out.clone()]);
        assert!(graph.leads_back_to(&"a".into()));
    }

    #[test]
    fn test_leads_back_to() {
        let mut graph = graph_of(&["a", "b", "c"]);
        graph.link(&PortRef::new("a", "out"), &PortRef::new("b", "in"));
        graph.link(&PortRef::new("b", "out"), &PortRef::new("c", "in"));
        assert!(!graph.leads_back_to(&"a".into()));

        graph.link(&PortRef::new("c", "out"), &PortRef::new("a", "in"));
        assert!(graph.leads_back_to(&"a".into()));
        assert!(graph.leads_back_to(&"b".into()));
    }

    #[test]
    fn test_leads_back_to_terminates_on_foreign_cycle() {
        // b <-> c is a cycle that does not pass through a
        let mut graph = graph_of(&["a", "b", "c"]);
        graph.link(&PortRef::new("a", "out"), &PortRef::new("b", "in"));
        graph.link(&PortRef::new("b", "out"), &PortRef::new("c", "in"));
        graph.link(&PortRef::new("c", "out"), &PortRef::new("b", "in2"));
        assert!(!graph.leads_back_to(&"a".into()));
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut graph = graph_of(&["a", "b", "c"]);
        graph.link(&PortRef::new("a", "out"), &PortRef::new("b", "in"));
        graph.link(&PortRef::new("b", "out"), &PortRef::new("c", "in"));

        let removed = graph.remove_node(&"b".into()).unwrap();
        assert_eq!(removed.id, NodeId::from("b"));
        assert!(graph.nodes().all(|n| n.connections.is_empty()));
    }

    #[test]
    fn test_node_mut_unshares() {
        let graph = graph_of(&["a", "b"]);
        let mut next = graph.clone();
        next.node_mut(&"a".into()).unwrap().x = 10.0;

        assert!(!graph.shares_node(&next, &"a".into()));
        assert!(graph.shares_node(&next, &"b".into()));
        assert_eq!(graph.node(&"a".into()).unwrap().x, 0.0);
    }

    #[test]
    fn test_rename_node_rewrites_references() {
        let mut graph = graph_of(&["a", "b"]);
        graph.link(&PortRef::new("a", "out"), &PortRef::new("b", "in"));
        graph.rename_node(&"a".into(), "z".into());

        assert!(!graph.contains(&"a".into()));
        assert!(graph.has_edge(&PortRef::new("z", "out"), &PortRef::new("b", "in")));
        assert!(graph.asymmetric_edges().is_empty());
    }

    #[test]
    fn test_rename_node_keeps_position() {
        let mut graph = graph_of(&["a", "b", "c"]);
        graph.rename_node(&"b".into(), "z".into());
        let order: Vec<&str> = graph.node_ids().map(NodeId::as_str).collect();
        assert_eq!(order, ["a", "z", "c"]);
    }
}
