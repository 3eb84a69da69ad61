// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation.
//!
//! Evaluation pulls values from a root node: each connected input recursively
//! resolves the node feeding it, each unconnected input resolves its controls.
//! The host supplies both leaf computations through [`NodeHost`].
//!
//! Results are not cached between paths by default, so a node reached twice
//! is fired twice. [`ResolveOptions::memoize`] opts into caching within a call.

use crate::connection::PortRef;
use crate::graph::Graph;
use crate::node::{ControlData, Node, NodeId, NodeType};
use crate::registry::Registry;
use crate::Context;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Default bound on connection resolutions per call
pub const DEFAULT_MAX_LOOPS: usize = 1000;

/// Deepest chain of nested connection resolutions, whatever the loop budget
pub const MAX_RESOLVE_DEPTH: usize = 512;

/// Values by port name
pub type PortValues<V> = IndexMap<String, V>;

/// Host-supplied computations
pub trait NodeHost {
    /// Value flowing along edges
    type Value: Clone;

    /// Value of an unconnected input port from its control data
    fn resolve_input_controls(&self, port_type: &str, data: &ControlData, context: &Context) -> Self::Value;

    /// Outputs of a node given its resolved inputs
    fn fire_node_function(
        &self,
        node: &Node,
        inputs: &PortValues<Self::Value>,
        node_type: &NodeType,
        context: &Context,
    ) -> PortValues<Self::Value>;
}

/// [`NodeHost`] built from two closures
pub struct FnHost<V, C, F> {
    resolve_controls: C,
    fire: F,
    _value: PhantomData<fn() -> V>,
}

impl<V, C, F> FnHost<V, C, F>
where
    V: Clone,
    C: Fn(&str, &ControlData, &Context) -> V,
    F: Fn(&Node, &PortValues<V>, &NodeType, &Context) -> PortValues<V>,
{
    /// Wrap the control resolver and the node function
    pub fn new(resolve_controls: C, fire: F) -> Self {
        Self {
            resolve_controls,
            fire,
            _value: PhantomData,
        }
    }
}

impl<V, C, F> NodeHost for FnHost<V, C, F>
where
    V: Clone,
    C: Fn(&str, &ControlData, &Context) -> V,
    F: Fn(&Node, &PortValues<V>, &NodeType, &Context) -> PortValues<V>,
{
    type Value = V;

    fn resolve_input_controls(&self, port_type: &str, data: &ControlData, context: &Context) -> V {
        (self.resolve_controls)(port_type, data, context)
    }

    fn fire_node_function(
        &self,
        node: &Node,
        inputs: &PortValues<V>,
        node_type: &NodeType,
        context: &Context,
    ) -> PortValues<V> {
        (self.fire)(node, inputs, node_type, context)
    }
}

/// Resolution ran past its loop budget
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Max loop count of {max_loops} exceeded")]
pub struct LoopError {
    /// The budget that was exceeded
    pub max_loops: usize,
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// More than one node is flagged root
    #[error("The root engine must not be called with more than one root node, found: {}", .0.join(", "))]
    MultipleRootNodes(Vec<String>),

    /// Loop budget exceeded
    #[error(transparent)]
    Loop(#[from] LoopError),

    /// Chain of connections nested deeper than [`MAX_RESOLVE_DEPTH`]
    #[error("Resolution nested deeper than {max_depth} connections")]
    DepthExceeded {
        /// The depth limit
        max_depth: usize,
    },

    /// Edge points at a missing node
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node type not registered
    #[error("Node {node} has unregistered type \"{node_type}\"")]
    UnknownNodeType {
        /// Node
        node: NodeId,
        /// Its type
        node_type: String,
    },

    /// Node function did not produce a connected output
    #[error("Node {node} produced no value for output \"{port}\"")]
    NodeOutputMissing {
        /// Node
        node: NodeId,
        /// Output port
        port: String,
    },
}

/// Options for [`RootEngine::resolve_root_node`]
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Evaluate this node instead of the flagged root
    pub root_node_id: Option<NodeId>,
    /// Host context passed through to every callback
    pub context: Context,
    /// Connection resolutions allowed per call; `None` is unbounded
    pub max_loops: Option<usize>,
    /// Return only the values of connected inputs
    pub only_resolve_connected: bool,
    /// Fire each node at most once per call
    pub memoize: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            root_node_id: None,
            context: Context::Null,
            max_loops: Some(DEFAULT_MAX_LOOPS),
            only_resolve_connected: false,
            memoize: false,
        }
    }
}

impl ResolveOptions {
    /// Evaluate a specific node
    pub fn root_node_id(mut self, id: impl Into<NodeId>) -> Self {
        self.root_node_id = Some(id.into());
        self
    }

    /// Set the host context
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Set the loop budget
    pub fn max_loops(mut self, max_loops: Option<usize>) -> Self {
        self.max_loops = max_loops;
        self
    }

    /// Return only connected inputs
    pub fn only_resolve_connected(mut self, only: bool) -> Self {
        self.only_resolve_connected = only;
        self
    }

    /// Cache node outputs within a call
    pub fn memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }
}

/// Mutable state of one resolution call
struct Walk<'g, V> {
    graph: &'g Graph,
    context: &'g Context,
    loops: usize,
    max_loops: Option<usize>,
    depth: usize,
    cache: Option<HashMap<NodeId, PortValues<V>>>,
}

impl<V> Walk<'_, V> {
    fn check_loops(&mut self) -> Result<(), LoopError> {
        if let Some(max_loops) = self.max_loops {
            if self.loops > max_loops {
                return Err(LoopError { max_loops });
            }
        }
        self.loops += 1;
        Ok(())
    }

    fn descend(&mut self) -> Result<(), EvaluationError> {
        if self.depth >= MAX_RESOLVE_DEPTH {
            return Err(EvaluationError::DepthExceeded {
                max_depth: MAX_RESOLVE_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }
}

/// Evaluates graphs against a registry with host callbacks
pub struct RootEngine<'r, H> {
    registry: &'r Registry,
    host: H,
}

impl<'r, H: NodeHost> RootEngine<'r, H> {
    /// Create an engine
    pub fn new(registry: &'r Registry, host: H) -> Self {
        Self { registry, host }
    }

    /// The host callbacks
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Resolve the inputs of the root node.
    ///
    /// Only [`EvaluationError::MultipleRootNodes`] escapes. A connected input
    /// whose resolution fails is logged and left out of the result.
    pub fn resolve_root_node(
        &self,
        graph: &Graph,
        options: &ResolveOptions,
    ) -> Result<PortValues<H::Value>, EvaluationError> {
        let root = match &options.root_node_id {
            Some(id) => graph.node(id),
            None => find_root_node(graph)?,
        };
        let Some(root) = root else {
            tracing::error!(
                "A root node was not found. The root engine requires that exactly one node be marked as the root node"
            );
            return Ok(PortValues::new());
        };
        let Some(node_type) = self.registry.node_type(&root.node_type) else {
            tracing::error!("Root node {} has unregistered type \"{}\"", root.id, root.node_type);
            return Ok(PortValues::new());
        };

        let context = &options.context;
        let ports = node_type
            .inputs
            .resolve(&root.input_data, &root.connections, context);
        let mut control_values = PortValues::new();
        for port in ports.iter() {
            let value = self.resolve_controls(root, &port.port_type, &port.name, context);
            control_values.insert(port.name.clone(), value);
        }

        let mut walk = Walk {
            graph,
            context,
            loops: 0,
            max_loops: options.max_loops,
            depth: 0,
            cache: options.memoize.then(HashMap::new),
        };
        let mut connected = PortValues::new();
        let mut failed = Vec::new();
        for (input_name, sources) in &root.connections.inputs {
            let Some(source) = sources.first() else {
                continue;
            };
            match self.value_of_connection(source, &mut walk) {
                Ok(value) => {
                    connected.insert(input_name.clone(), value);
                }
                Err(EvaluationError::Loop(err)) => {
                    tracing::error!("{err}. Circular nodes detected in {input_name} port");
                    failed.push(input_name);
                }
                Err(err) => {
                    tracing::error!("Failed to resolve {input_name} port: {err}");
                    failed.push(input_name);
                }
            }
        }

        if options.only_resolve_connected {
            return Ok(connected);
        }
        for input_name in failed {
            control_values.shift_remove(input_name);
        }
        control_values.extend(connected);
        Ok(control_values)
    }

    fn resolve_controls(&self, node: &Node, port_type: &str, port_name: &str, context: &Context) -> H::Value {
        let empty = ControlData::new();
        let data = node.input_data.get(port_name).unwrap_or(&empty);
        self.host.resolve_input_controls(port_type, data, context)
    }

    fn value_of_connection(&self, source: &PortRef, walk: &mut Walk<'_, H::Value>) -> Result<H::Value, EvaluationError> {
        walk.check_loops()?;
        walk.descend()?;
        let value = self.fire_source(source, walk);
        walk.depth -= 1;
        value
    }

    fn fire_source(&self, source: &PortRef, walk: &mut Walk<'_, H::Value>) -> Result<H::Value, EvaluationError> {
        if let Some(cached) = walk.cache.as_ref().and_then(|c| c.get(&source.node_id)) {
            return output_value(cached, source);
        }

        let graph = walk.graph;
        let context = walk.context;
        let node = graph
            .node(&source.node_id)
            .ok_or_else(|| EvaluationError::NodeNotFound(source.node_id.clone()))?;
        let node_type = self
            .registry
            .node_type(&node.node_type)
            .ok_or_else(|| EvaluationError::UnknownNodeType {
                node: node.id.clone(),
                node_type: node.node_type.clone(),
            })?;

        let inputs = self.resolve_input_values(node, node_type, walk)?;
        let outputs = self
            .host
            .fire_node_function(node, &inputs, node_type, context);
        let value = output_value(&outputs, source);
        if let Some(cache) = walk.cache.as_mut() {
            cache.insert(node.id.clone(), outputs);
        }
        value
    }

    fn resolve_input_values(
        &self,
        node: &Node,
        node_type: &NodeType,
        walk: &mut Walk<'_, H::Value>,
    ) -> Result<PortValues<H::Value>, EvaluationError> {
        let ports = node_type
            .inputs
            .resolve(&node.input_data, &node.connections, walk.context);
        let mut values = PortValues::new();
        for port in ports.iter() {
            let value = match node.connections.input(&port.name) {
                Some(source) => self.value_of_connection(source, walk)?,
                None => self.resolve_controls(node, &port.port_type, &port.name, walk.context),
            };
            values.insert(port.name.clone(), value);
        }
        Ok(values)
    }
}

fn find_root_node(graph: &Graph) -> Result<Option<&Node>, EvaluationError> {
    let mut roots = graph.root_nodes();
    let first = roots.next();
    let rest: Vec<&Node> = roots.collect();
    if rest.is_empty() {
        return Ok(first);
    }
    let ids = first
        .into_iter()
        .chain(rest)
        .map(|n| n.id.to_string())
        .collect();
    Err(EvaluationError::MultipleRootNodes(ids))
}

fn output_value<V: Clone>(outputs: &PortValues<V>, source: &PortRef) -> Result<V, EvaluationError> {
    outputs
        .get(&source.port_name)
        .cloned()
        .ok_or_else(|| EvaluationError::NodeOutputMissing {
            node: source.node_id.clone(),
            port: source.port_name.clone(),
        })
}
