// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph state machine.
//!
//! [`transition`] is a pure function from a graph and an action to a new
//! graph plus the notifications raised along the way. A rejected action yields
//! a graph equal to the input.

use crate::connection::{PortRef, TransputType};
use crate::graph::Graph;
use crate::ids::IdGenerator;
use crate::node::{ControlData, InputData, Node, NodeId, NodeType, DEFAULT_NODE_WIDTH};
use crate::port::{ControlValue, SetValueFn};
use crate::registry::Registry;
use crate::Context;
use serde::{Deserialize, Serialize};

static NULL_CONTEXT: Context = Context::Null;

/// Generated IDs tried before giving up on a fresh one
pub const MAX_ID_ATTEMPTS: usize = 32;

/// What to do with a connection that would close a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircularBehavior {
    /// Reject the connection and notify
    #[default]
    Forbid,
    /// Commit the connection and notify
    Warn,
    /// Commit silently
    Allow,
}

/// Topology-mutating actions
#[derive(Debug, Clone)]
pub enum GraphAction {
    /// Create a node
    AddNode {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
        /// Node type ID
        node_type: String,
        /// Use this ID instead of generating one
        id: Option<NodeId>,
        /// Flag the node as a design-time seed
        default_node: bool,
    },
    /// Delete a node and every edge touching it
    RemoveNode {
        /// Node to delete
        node_id: NodeId,
    },
    /// Connect an output port to an input port
    AddConnection {
        /// Receiving input port
        input: PortRef,
        /// Sending output port
        output: PortRef,
    },
    /// Disconnect an output port from an input port
    RemoveConnection {
        /// Receiving input port
        input: PortRef,
        /// Sending output port
        output: PortRef,
    },
    /// Drop every edge touching a port
    DestroyTransput {
        /// The port
        transput: PortRef,
        /// Side of the node the port is on
        transput_type: TransputType,
    },
    /// Write one control value
    SetPortData {
        /// Node to edit
        node_id: NodeId,
        /// Input port name
        port_name: String,
        /// Control name
        control_name: String,
        /// New value
        data: ControlValue,
        /// Replaces the whole input data instead of the plain merge
        set_value: Option<SetValueFn>,
    },
    /// Move a node
    SetNodeCoordinates {
        /// Node to move
        node_id: NodeId,
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
    },
    /// Give every seed node a fresh ID and clear its seed flag
    HydrateDefaultNodes,
    /// Remove all nodes
    ClearNodes,
}

impl GraphAction {
    /// Add a node of a type at a position with a generated ID
    pub fn add_node(node_type: impl Into<String>, x: f32, y: f32) -> Self {
        Self::AddNode {
            x,
            y,
            node_type: node_type.into(),
            id: None,
            default_node: false,
        }
    }

    /// Connect `output` to `input`
    pub fn connect(output: PortRef, input: PortRef) -> Self {
        Self::AddConnection { input, output }
    }

    /// Disconnect `output` from `input`
    pub fn disconnect(output: PortRef, input: PortRef) -> Self {
        Self::RemoveConnection { input, output }
    }

    /// Set a control value with the plain merge
    pub fn set_port_data(
        node_id: impl Into<NodeId>,
        port_name: impl Into<String>,
        control_name: impl Into<String>,
        data: impl Into<ControlValue>,
    ) -> Self {
        Self::SetPortData {
            node_id: node_id.into(),
            port_name: port_name.into(),
            control_name: control_name.into(),
            data: data.into(),
            set_value: None,
        }
    }
}

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Informational
    Info,
    /// Something the user should look at
    Warning,
    /// Something failed
    Error,
}

/// Message for the user raised by a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
}

impl Notification {
    fn circular_connection() -> Self {
        Self {
            level: NotificationLevel::Warning,
            title: "Unable to connect".to_string(),
            message: "Connecting to this input would create a circular link.".to_string(),
        }
    }
}

/// Result of a transition
#[derive(Debug, Clone)]
pub struct Transition {
    /// The next graph
    pub graph: Graph,
    /// Notifications in the order they were raised
    pub events: Vec<Notification>,
}

impl Transition {
    fn quiet(graph: Graph) -> Self {
        Self {
            graph,
            events: Vec::new(),
        }
    }
}

/// Everything a transition needs besides the graph and the action
pub struct MutatorEnv<'a> {
    /// Node and port types
    pub registry: &'a Registry,
    /// Cycle policy
    pub circular_behavior: CircularBehavior,
    /// Host context passed to port resolvers
    pub context: &'a Context,
    /// Width of nodes whose type sets none
    pub default_node_width: f32,
    /// Source of fresh node IDs
    pub ids: &'a mut dyn IdGenerator,
}

impl<'a> MutatorEnv<'a> {
    /// Create an environment with the forbid policy and a null context
    pub fn new(registry: &'a Registry, ids: &'a mut dyn IdGenerator) -> Self {
        Self {
            registry,
            circular_behavior: CircularBehavior::default(),
            context: &NULL_CONTEXT,
            default_node_width: DEFAULT_NODE_WIDTH,
            ids,
        }
    }

    /// Set the cycle policy
    pub fn with_circular_behavior(mut self, behavior: CircularBehavior) -> Self {
        self.circular_behavior = behavior;
        self
    }

    /// Set the host context
    pub fn with_context(mut self, context: &'a Context) -> Self {
        self.context = context;
        self
    }

    /// Set the fallback node width
    pub fn with_default_node_width(mut self, width: f32) -> Self {
        self.default_node_width = width;
        self
    }
}

/// Apply an action to a graph
pub fn transition(graph: &Graph, action: GraphAction, env: &mut MutatorEnv<'_>) -> Transition {
    match action {
        GraphAction::AddNode {
            x,
            y,
            node_type,
            id,
            default_node,
        } => add_node(graph, x, y, &node_type, id, default_node, env),
        GraphAction::RemoveNode { node_id } => {
            let mut next = graph.clone();
            if next.remove_node(&node_id).is_none() {
                tracing::warn!("Cannot remove node {node_id}: not in graph");
            }
            Transition::quiet(next)
        }
        GraphAction::AddConnection { input, output } => add_connection(graph, input, output, env),
        GraphAction::RemoveConnection { input, output } => {
            let mut next = graph.clone();
            next.unlink(&output, &input);
            Transition::quiet(next)
        }
        GraphAction::DestroyTransput {
            transput,
            transput_type,
        } => Transition::quiet(destroy_transput(graph, &transput, transput_type)),
        GraphAction::SetPortData {
            node_id,
            port_name,
            control_name,
            data,
            set_value,
        } => set_port_data(graph, &node_id, port_name, control_name, data, set_value, env),
        GraphAction::SetNodeCoordinates { node_id, x, y } => {
            let mut next = graph.clone();
            match next.node_mut(&node_id) {
                Some(node) => {
                    node.x = x;
                    node.y = y;
                }
                None => tracing::warn!("Cannot move node {node_id}: not in graph"),
            }
            Transition::quiet(next)
        }
        GraphAction::HydrateDefaultNodes => Transition::quiet(hydrate_default_nodes(graph, &mut *env.ids)),
        GraphAction::ClearNodes => Transition::quiet(Graph::new()),
    }
}

fn add_node(
    graph: &Graph,
    x: f32,
    y: f32,
    type_name: &str,
    id: Option<NodeId>,
    default_node: bool,
    env: &mut MutatorEnv<'_>,
) -> Transition {
    let registry = env.registry;
    let Some(node_type) = registry.node_type(type_name) else {
        tracing::warn!("Cannot add node of unknown type \"{type_name}\"");
        return Transition::quiet(graph.clone());
    };
    let id = match id {
        Some(id) if graph.contains(&id) => {
            tracing::warn!("Cannot add node {id}: ID already in use");
            return Transition::quiet(graph.clone());
        }
        Some(id) => id,
        None => match fresh_id(graph, &mut *env.ids) {
            Some(id) => id,
            None => {
                tracing::warn!(
                    "Cannot add node of type \"{type_name}\": no unused ID after {MAX_ID_ATTEMPTS} attempts"
                );
                return Transition::quiet(graph.clone());
            }
        },
    };

    let mut node = Node::new(id, type_name, x, y);
    node.width = node_type.initial_width.unwrap_or(env.default_node_width);
    node.input_data = default_input_data(&node, node_type, registry, env.context);
    node.root = node_type.root;
    node.default_node = default_node;

    tracing::debug!("Added node {} of type \"{type_name}\"", node.id);
    let mut next = graph.clone();
    next.insert(node);
    Transition::quiet(next)
}

fn add_connection(graph: &Graph, input: PortRef, output: PortRef, env: &MutatorEnv<'_>) -> Transition {
    let Some(input_node) = graph.node(&input.node_id) else {
        tracing::warn!("Cannot connect to missing node {}", input.node_id);
        return Transition::quiet(graph.clone());
    };
    if input_node.connections.is_input_connected(&input.port_name) {
        return Transition::quiet(graph.clone());
    }

    let mut next = graph.clone();
    if !next.link(&output, &input) {
        tracing::warn!("Cannot connect from missing node {}", output.node_id);
        return Transition::quiet(graph.clone());
    }

    if !next.leads_back_to(&output.node_id) {
        return Transition::quiet(next);
    }
    match env.circular_behavior {
        CircularBehavior::Forbid => Transition {
            graph: graph.clone(),
            events: vec![Notification::circular_connection()],
        },
        CircularBehavior::Warn => Transition {
            graph: next,
            events: vec![Notification::circular_connection()],
        },
        CircularBehavior::Allow => Transition::quiet(next),
    }
}

fn destroy_transput(graph: &Graph, transput: &PortRef, side: TransputType) -> Graph {
    let mut next = graph.clone();
    let Some(edges) = graph
        .node(&transput.node_id)
        .and_then(|n| n.connections.side(side).get(&transput.port_name))
    else {
        return next;
    };
    for remote in edges {
        match side {
            TransputType::Input => next.unlink(remote, transput),
            TransputType::Output => next.unlink(transput, remote),
        }
    }
    next
}

fn set_port_data(
    graph: &Graph,
    node_id: &NodeId,
    port_name: String,
    control_name: String,
    data: ControlValue,
    set_value: Option<SetValueFn>,
    env: &MutatorEnv<'_>,
) -> Transition {
    let Some(node) = graph.node(node_id) else {
        tracing::warn!("Cannot set data on missing node {node_id}");
        return Transition::quiet(graph.clone());
    };
    let set_value = set_value.or_else(|| control_set_value(node, &port_name, &control_name, env));

    let mut input_data = node.input_data.clone();
    input_data
        .entry(port_name)
        .or_default()
        .insert(control_name, data);
    if let Some(set_value) = set_value {
        input_data = set_value.call(&input_data, &node.input_data);
    }

    let mut next = graph.clone();
    if let Some(node) = next.node_mut(node_id) {
        node.input_data = input_data;
    }
    Transition::quiet(next)
}

/// The `set_value` override declared by a control on one of the node's inputs
fn control_set_value(node: &Node, port_name: &str, control_name: &str, env: &MutatorEnv<'_>) -> Option<SetValueFn> {
    let node_type = env.registry.node_type(&node.node_type)?;
    let ports = node_type
        .inputs
        .resolve(&node.input_data, &node.connections, env.context);
    let port = ports.iter().find(|p| p.name == port_name)?;
    port.effective_controls(env.registry.port_type(&port.port_type))
        .iter()
        .find(|c| c.name == control_name)
        .and_then(|c| c.set_value.clone())
}

fn hydrate_default_nodes(graph: &Graph, ids: &mut dyn IdGenerator) -> Graph {
    let seeds: Vec<NodeId> = graph
        .nodes()
        .filter(|n| n.default_node)
        .map(|n| n.id.clone())
        .collect();
    if seeds.is_empty() {
        return graph.clone();
    }

    let mut next = graph.clone();
    for old_id in seeds {
        let Some(new_id) = fresh_id(&next, ids) else {
            tracing::warn!("Seed node {old_id} kept its ID: no unused ID after {MAX_ID_ATTEMPTS} attempts");
            continue;
        };
        next.rename_node(&old_id, new_id.clone());
        if let Some(node) = next.node_mut(&new_id) {
            node.default_node = false;
        }
    }
    next
}

/// A generated ID not yet in the graph
fn fresh_id(graph: &Graph, ids: &mut dyn IdGenerator) -> Option<NodeId> {
    (0..MAX_ID_ATTEMPTS)
        .map(|_| NodeId::new(ids.next_id()))
        .find(|candidate| !graph.contains(candidate))
}

/// Default input data for a node: every control of every resolved input port
/// mapped to its default value
pub fn default_input_data(node: &Node, node_type: &NodeType, registry: &Registry, context: &Context) -> InputData {
    node_type
        .inputs
        .resolve(&node.input_data, &node.connections, context)
        .iter()
        .map(|port| {
            let controls: ControlData = port
                .effective_controls(registry.port_type(&port.port_type))
                .iter()
                .map(|c| (c.name.clone(), c.default_value.clone()))
                .collect();
            (port.name.clone(), controls)
        })
        .collect()
}

/// Bring persisted nodes in line with the current registry.
///
/// Nodes of unknown types are removed with their edges; input data gets new
/// controls' defaults and loses stale ports and controls; `root` follows the
/// node type.
pub fn reconcile_nodes(graph: &Graph, registry: &Registry, context: &Context) -> Graph {
    let mut next = graph.clone();

    let orphans: Vec<NodeId> = graph
        .nodes()
        .filter(|n| registry.node_type(&n.node_type).is_none())
        .map(|n| n.id.clone())
        .collect();
    for node_id in &orphans {
        tracing::warn!("Removing node {node_id}: its type is no longer registered");
        next.remove_node(node_id);
    }

    let survivors: Vec<NodeId> = next.node_ids().cloned().collect();
    for node_id in survivors {
        let Some(node) = next.node(&node_id) else {
            continue;
        };
        let Some(node_type) = registry.node_type(&node.node_type) else {
            continue;
        };

        let mut input_data = default_input_data(node, node_type, registry, context);
        for (port_name, controls) in input_data.iter_mut() {
            let Some(current) = node.input_data.get(port_name) else {
                continue;
            };
            for (control_name, value) in controls.iter_mut() {
                if let Some(existing) = current.get(control_name) {
                    *value = existing.clone();
                }
            }
        }

        if input_data != node.input_data || node.root != node_type.root {
            let root = node_type.root;
            if let Some(node) = next.node_mut(&node_id) {
                node.input_data = input_data;
                node.root = root;
            }
        }
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::port::{ControlSpec, PortType};

    fn registry() -> Registry {
        let number = PortType::new("number", "number").with_control(ControlSpec::number("number", "Number"));
        let mut registry = Registry::new();
        registry
            .add_port_type(number.clone())
            .unwrap()
            .add_node_type(
                NodeType::new("number")
                    .inputs(vec![number.port()])
                    .outputs(vec![number.port()]),
            )
            .unwrap()
            .add_node_type(
                NodeType::new("wide")
                    .initial_width(320.0)
                    .inputs(vec![number.port().name("a"), number.port().name("b").no_controls()]),
            )
            .unwrap()
            .add_root_node_type(NodeType::new("output").inputs(vec![number.port().name("x")]))
            .unwrap();
        registry
    }

    fn apply(graph: &Graph, action: GraphAction, registry: &Registry, ids: &mut SequentialIds) -> Transition {
        let mut env = MutatorEnv::new(registry, ids);
        transition(graph, action, &mut env)
    }

    #[test]
    fn test_add_node_defaults() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let t = apply(&Graph::new(), GraphAction::add_node("number", 5.0, 6.0), &registry, &mut ids);

        let node = t.graph.node(&"n1".into()).unwrap();
        assert_eq!((node.x, node.y), (5.0, 6.0));
        assert_eq!(node.width, DEFAULT_NODE_WIDTH);
        assert!(node.connections.is_empty());
        assert_eq!(node.input_data["number"]["number"], ControlValue::Number(0.0));
        assert!(!node.root);
        assert!(t.events.is_empty());
    }

    #[test]
    fn test_add_node_width_root_and_no_controls() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let t = apply(&Graph::new(), GraphAction::add_node("wide", 0.0, 0.0), &registry, &mut ids);
        let node = t.graph.node(&"n1".into()).unwrap();
        assert_eq!(node.width, 320.0);
        assert_eq!(node.input_data["a"].len(), 1);
        assert!(node.input_data["b"].is_empty());

        let t = apply(&t.graph, GraphAction::add_node("output", 0.0, 0.0), &registry, &mut ids);
        assert!(t.graph.node(&"n2".into()).unwrap().root);
    }

    #[test]
    fn test_add_node_supplied_id_and_unknown_type() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let action = GraphAction::AddNode {
            x: 0.0,
            y: 0.0,
            node_type: "number".to_string(),
            id: Some("mine".into()),
            default_node: true,
        };
        let t = apply(&Graph::new(), action.clone(), &registry, &mut ids);
        assert!(t.graph.node(&"mine".into()).unwrap().default_node);

        // Same ID again is refused
        let again = apply(&t.graph, action, &registry, &mut ids);
        assert_eq!(again.graph, t.graph);

        let unknown = apply(&t.graph, GraphAction::add_node("ghost", 0.0, 0.0), &registry, &mut ids);
        assert_eq!(unknown.graph, t.graph);
    }

    #[test]
    fn test_set_port_data_merges() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let t = apply(&Graph::new(), GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids);
        let t = apply(
            &t.graph,
            GraphAction::set_port_data("n1", "number", "number", 42.0),
            &registry,
            &mut ids,
        );
        let node = t.graph.node(&"n1".into()).unwrap();
        assert_eq!(node.input_data["number"]["number"], ControlValue::Number(42.0));

        // New ports and controls are created on demand
        let t = apply(
            &t.graph,
            GraphAction::set_port_data("n1", "extra", "note", "hi"),
            &registry,
            &mut ids,
        );
        let node = t.graph.node(&"n1".into()).unwrap();
        assert_eq!(node.input_data["extra"]["note"], ControlValue::from("hi"));
        assert_eq!(node.input_data["number"]["number"], ControlValue::Number(42.0));
    }

    #[test]
    fn test_set_port_data_action_set_value_replaces() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let t = apply(&Graph::new(), GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids);
        let action = GraphAction::SetPortData {
            node_id: "n1".into(),
            port_name: "number".to_string(),
            control_name: "number".to_string(),
            data: ControlValue::Number(3.0),
            set_value: Some(SetValueFn::new(|new, old| {
                let mut data = new.clone();
                let previous = old["number"]["number"].clone();
                data.entry("history".to_string())
                    .or_default()
                    .insert("previous".to_string(), previous);
                data
            })),
        };
        let t = apply(&t.graph, action, &registry, &mut ids);
        let node = t.graph.node(&"n1".into()).unwrap();
        assert_eq!(node.input_data["number"]["number"], ControlValue::Number(3.0));
        assert_eq!(node.input_data["history"]["previous"], ControlValue::Number(0.0));
    }

    #[test]
    fn test_set_port_data_control_set_value() {
        // Keeps min <= max by pushing the other bound along
        let range = PortType::new("range", "range")
            .with_control(ControlSpec::number("min", "Min").with_set_value(|new, _| {
                let mut data = new.clone();
                let controls = data.entry("range".to_string()).or_default();
                let min = controls.get("min").and_then(ControlValue::as_f64).unwrap_or(0.0);
                let max = controls.get("max").and_then(ControlValue::as_f64).unwrap_or(0.0);
                if min > max {
                    controls.insert("max".to_string(), ControlValue::Number(min));
                }
                data
            }))
            .with_control(ControlSpec::number("max", "Max").with_default(1.0));
        let mut registry = Registry::new();
        registry
            .add_port_type(range.clone())
            .unwrap()
            .add_node_type(NodeType::new("clamp").inputs(vec![range.port()]))
            .unwrap();

        let mut ids = SequentialIds::new("n");
        let t = apply(&Graph::new(), GraphAction::add_node("clamp", 0.0, 0.0), &registry, &mut ids);
        let t = apply(&t.graph, GraphAction::set_port_data("n1", "range", "min", 5.0), &registry, &mut ids);
        let data = &t.graph.node(&"n1".into()).unwrap().input_data["range"];
        assert_eq!(data["min"], ControlValue::Number(5.0));
        assert_eq!(data["max"], ControlValue::Number(5.0));
    }

    #[test]
    fn test_set_node_coordinates_shares_other_nodes() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let t = apply(&Graph::new(), GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids);
        let t = apply(&t.graph, GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids);
        let before = t.graph;
        let t = apply(
            &before,
            GraphAction::SetNodeCoordinates {
                node_id: "n1".into(),
                x: 12.0,
                y: -3.0,
            },
            &registry,
            &mut ids,
        );
        let node = t.graph.node(&"n1".into()).unwrap();
        assert_eq!((node.x, node.y), (12.0, -3.0));
        assert!(t.graph.shares_node(&before, &"n2".into()));
        assert!(!t.graph.shares_node(&before, &"n1".into()));
    }

    #[test]
    fn test_connection_fan_in_and_destroy_transput() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let mut graph = Graph::new();
        for _ in 0..3 {
            graph = apply(&graph, GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids).graph;
        }
        let out1 = PortRef::new("n1", "number");
        let out2 = PortRef::new("n2", "number");
        let input = PortRef::new("n3", "number");

        graph = apply(&graph, GraphAction::connect(out1.clone(), input.clone()), &registry, &mut ids).graph;
        let refused = apply(&graph, GraphAction::connect(out2.clone(), input.clone()), &registry, &mut ids);
        assert_eq!(refused.graph, graph);
        assert!(refused.events.is_empty());

        // Fan out from n1 to n2 as well
        graph = apply(
            &graph,
            GraphAction::connect(out1.clone(), PortRef::new("n2", "number")),
            &registry,
            &mut ids,
        )
        .graph;
        assert_eq!(graph.connection_count(), 2);

        let destroyed = apply(
            &graph,
            GraphAction::DestroyTransput {
                transput: out1,
                transput_type: TransputType::Output,
            },
            &registry,
            &mut ids,
        );
        assert_eq!(destroyed.graph.connection_count(), 0);
        assert!(destroyed.graph.nodes().all(|n| n.connections.is_empty()));
    }

    #[test]
    fn test_destroy_input_transput() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let mut graph = Graph::new();
        for _ in 0..2 {
            graph = apply(&graph, GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids).graph;
        }
        let input = PortRef::new("n2", "number");
        graph = apply(
            &graph,
            GraphAction::connect(PortRef::new("n1", "number"), input.clone()),
            &registry,
            &mut ids,
        )
        .graph;
        let t = apply(
            &graph,
            GraphAction::DestroyTransput {
                transput: input,
                transput_type: TransputType::Input,
            },
            &registry,
            &mut ids,
        );
        assert_eq!(t.graph.connection_count(), 0);
        assert!(t.graph.asymmetric_edges().is_empty());
    }

    #[test]
    fn test_self_connection_follows_policy() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let graph = apply(&Graph::new(), GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids).graph;
        let self_loop = GraphAction::connect(PortRef::new("n1", "number"), PortRef::new("n1", "number"));

        let forbidden = apply(&graph, self_loop.clone(), &registry, &mut ids);
        assert_eq!(forbidden.graph, graph);
        assert_eq!(forbidden.events.len(), 1);

        let mut env = MutatorEnv::new(&registry, &mut ids).with_circular_behavior(CircularBehavior::Allow);
        let allowed = transition(&graph, self_loop, &mut env);
        assert!(allowed.events.is_empty());
        let node = allowed.graph.node(&"n1".into()).unwrap();
        assert_eq!(node.connections.inputs["number"], vec![PortRef::new("n1", "number")]);
        assert_eq!(node.connections.outputs["number"], vec![PortRef::new("n1", "number")]);
    }

    #[test]
    fn test_hydrate_default_nodes() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let mut graph = Graph::new();
        for (id, seed) in [("seed", true), ("plain", false)] {
            let action = GraphAction::AddNode {
                x: 0.0,
                y: 0.0,
                node_type: "number".to_string(),
                id: Some(id.into()),
                default_node: seed,
            };
            graph = apply(&graph, action, &registry, &mut ids).graph;
        }
        graph = apply(
            &graph,
            GraphAction::connect(PortRef::new("seed", "number"), PortRef::new("plain", "number")),
            &registry,
            &mut ids,
        )
        .graph;

        let t = apply(&graph, GraphAction::HydrateDefaultNodes, &registry, &mut ids);
        assert!(!t.graph.contains(&"seed".into()));
        let fresh = t.graph.node(&"n1".into()).unwrap();
        assert!(!fresh.default_node);
        assert!(t.graph.has_edge(&PortRef::new("n1", "number"), &PortRef::new("plain", "number")));
        assert!(t.graph.asymmetric_edges().is_empty());

        // Nothing left to hydrate
        let again = apply(&t.graph, GraphAction::HydrateDefaultNodes, &registry, &mut ids);
        assert_eq!(again.graph, t.graph);
    }

    /// Hands out the same ID forever
    struct ConstantIds(&'static str);

    impl IdGenerator for ConstantIds {
        fn next_id(&mut self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_generated_id_skips_taken_ids() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let action = GraphAction::AddNode {
            x: 0.0,
            y: 0.0,
            node_type: "number".to_string(),
            id: Some("n1".into()),
            default_node: false,
        };
        let graph = apply(&Graph::new(), action, &registry, &mut ids).graph;

        let t = apply(&graph, GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids);
        assert_eq!(t.graph.node_count(), 2);
        assert!(t.graph.contains(&"n2".into()));
    }

    #[test]
    fn test_exhausted_ids_leave_graph_unchanged() {
        let registry = registry();
        let mut ids = ConstantIds("same");
        let mut env = MutatorEnv::new(&registry, &mut ids);
        let graph = transition(&Graph::new(), GraphAction::add_node("number", 0.0, 0.0), &mut env).graph;
        assert!(graph.contains(&"same".into()));

        let again = transition(&graph, GraphAction::add_node("number", 0.0, 0.0), &mut env);
        assert_eq!(again.graph, graph);
    }

    #[test]
    fn test_hydrate_gives_up_when_ids_run_out() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let mut graph = Graph::new();
        for id in ["a", "b"] {
            let action = GraphAction::AddNode {
                x: 0.0,
                y: 0.0,
                node_type: "number".to_string(),
                id: Some(id.into()),
                default_node: true,
            };
            graph = apply(&graph, action, &registry, &mut ids).graph;
        }

        let mut empty = ConstantIds("");
        let mut env = MutatorEnv::new(&registry, &mut empty);
        let t = transition(&graph, GraphAction::HydrateDefaultNodes, &mut env);
        assert_eq!(t.graph.node_count(), 2);
        assert!(!t.graph.node(&"".into()).unwrap().default_node);
        assert!(t.graph.node(&"b".into()).unwrap().default_node);
    }

    #[test]
    fn test_hydrate_keeps_node_order() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let mut graph = Graph::new();
        for (id, seed) in [("first", false), ("seed", true), ("last", false)] {
            let action = GraphAction::AddNode {
                x: 0.0,
                y: 0.0,
                node_type: "number".to_string(),
                id: Some(id.into()),
                default_node: seed,
            };
            graph = apply(&graph, action, &registry, &mut ids).graph;
        }

        let t = apply(&graph, GraphAction::HydrateDefaultNodes, &registry, &mut ids);
        let order: Vec<&str> = t.graph.node_ids().map(NodeId::as_str).collect();
        assert_eq!(order, ["first", "n1", "last"]);
    }

    #[test]
    fn test_clear_nodes() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let graph = apply(&Graph::new(), GraphAction::add_node("number", 0.0, 0.0), &registry, &mut ids).graph;
        assert!(apply(&graph, GraphAction::ClearNodes, &registry, &mut ids).graph.is_empty());
    }

    #[test]
    fn test_reconcile_removes_unknown_types_and_syncs_root() {
        let registry = registry();
        let mut ids = SequentialIds::new("n");
        let mut graph = Graph::new();
        for node_type in ["number", "number"] {
            graph = apply(&graph, GraphAction::add_node(node_type, 0.0, 0.0), &registry, &mut ids).graph;
        }
        graph = apply(
            &graph,
            GraphAction::connect(PortRef::new("n1", "number"), PortRef::new("n2", "number")),
            &registry,
            &mut ids,
        )
        .graph;
        let mut stray = Node::new("n3".into(), "retired", 0.0, 0.0);
        stray.root = true;
        graph.insert(stray);
        graph.node_mut(&"n1".into()).unwrap().root = true;

        let reconciled = reconcile_nodes(&graph, &registry, &Context::Null);

        assert!(!reconciled.contains(&"n3".into()));
        assert!(!reconciled.node(&"n1".into()).unwrap().root);
        assert!(reconciled.has_edge(&PortRef::new("n1", "number"), &PortRef::new("n2", "number")));
    }
}
