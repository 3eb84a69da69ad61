// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type definitions and node instances.

use crate::connection::Connections;
use crate::port::{ControlValue, PortSpec};
use crate::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Default node width when the node type gives none
pub const DEFAULT_NODE_WIDTH: f32 = 200.0;

/// Control values of one port, by control name
pub type ControlData = IndexMap<String, ControlValue>;

/// Control values of a node, by port name
pub type InputData = IndexMap<String, ControlData>;

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node ID from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Derives a node's ports from its current data, connections and the host context
pub type PortResolver = Arc<dyn Fn(&InputData, &Connections, &Context) -> Vec<PortSpec> + Send + Sync>;

/// Ports of a node type: a fixed list or a resolver
#[derive(Clone)]
pub enum PortList {
    /// Fixed ports
    Static(Vec<PortSpec>),
    /// Ports computed per node
    Dynamic(PortResolver),
}

impl PortList {
    /// Resolve the ports for a particular node
    pub fn resolve<'a>(
        &'a self,
        input_data: &InputData,
        connections: &Connections,
        context: &Context,
    ) -> Cow<'a, [PortSpec]> {
        match self {
            Self::Static(ports) => Cow::Borrowed(ports),
            Self::Dynamic(resolver) => Cow::Owned(resolver(input_data, connections, context)),
        }
    }

    /// Whether the ports are resolver-derived
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    /// The fixed ports, if any
    pub fn static_ports(&self) -> Option<&[PortSpec]> {
        match self {
            Self::Static(ports) => Some(ports),
            Self::Dynamic(_) => None,
        }
    }
}

impl Default for PortList {
    fn default() -> Self {
        Self::Static(Vec::new())
    }
}

impl fmt::Debug for PortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(ports) => f.debug_tuple("Static").field(ports).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub type_name: String,
    /// Display name
    pub label: String,
    /// Description
    pub description: String,
    /// Shown in the add-node menu
    pub addable: bool,
    /// May be deleted by the user
    pub deletable: bool,
    /// Nodes of this type are root nodes
    pub root: bool,
    /// Width of a fresh node
    pub initial_width: Option<f32>,
    /// Ordering in the add-node menu
    pub sort_index: Option<i32>,
    /// Input ports
    pub inputs: PortList,
    /// Output ports
    pub outputs: PortList,
}

impl NodeType {
    /// Create a node type with default attributes and no ports
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            label: String::new(),
            description: String::new(),
            addable: true,
            deletable: true,
            root: false,
            initial_width: None,
            sort_index: None,
            inputs: PortList::default(),
            outputs: PortList::default(),
        }
    }

    /// Set the label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set whether the type is offered in the add-node menu
    pub fn addable(mut self, addable: bool) -> Self {
        self.addable = addable;
        self
    }

    /// Set whether nodes of this type may be deleted
    pub fn deletable(mut self, deletable: bool) -> Self {
        self.deletable = deletable;
        self
    }

    /// Set the initial width
    pub fn initial_width(mut self, width: f32) -> Self {
        self.initial_width = Some(width);
        self
    }

    /// Set the menu sort index
    pub fn sort_index(mut self, index: i32) -> Self {
        self.sort_index = Some(index);
        self
    }

    /// Set fixed input ports
    pub fn inputs(mut self, ports: Vec<PortSpec>) -> Self {
        self.inputs = PortList::Static(ports);
        self
    }

    /// Set fixed output ports
    pub fn outputs(mut self, ports: Vec<PortSpec>) -> Self {
        self.outputs = PortList::Static(ports);
        self
    }

    /// Derive input ports per node
    pub fn dynamic_inputs(
        mut self,
        resolver: impl Fn(&InputData, &Connections, &Context) -> Vec<PortSpec> + Send + Sync + 'static,
    ) -> Self {
        self.inputs = PortList::Dynamic(Arc::new(resolver));
        self
    }

    /// Derive output ports per node
    pub fn dynamic_outputs(
        mut self,
        resolver: impl Fn(&InputData, &Connections, &Context) -> Vec<PortSpec> + Send + Sync + 'static,
    ) -> Self {
        self.outputs = PortList::Dynamic(Arc::new(resolver));
        self
    }

    /// Whether either port list is resolver-derived
    pub fn has_dynamic_ports(&self) -> bool {
        self.inputs.is_dynamic() || self.outputs.is_dynamic()
    }

    /// Whether a fixed port list uses the given port type
    pub fn uses_port_type(&self, port_type: &str) -> bool {
        [&self.inputs, &self.outputs]
            .into_iter()
            .filter_map(PortList::static_ports)
            .flatten()
            .any(|p| p.port_type == port_type)
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    #[serde(rename = "type")]
    pub node_type: String,
    /// Horizontal position
    pub x: f32,
    /// Vertical position
    pub y: f32,
    /// Width
    #[serde(default = "default_width")]
    pub width: f32,
    /// Control values by port and control name
    #[serde(default)]
    pub input_data: InputData,
    /// Edge records on both sides of the node
    #[serde(default)]
    pub connections: Connections,
    /// Root flag
    #[serde(default, skip_serializing_if = "is_false")]
    pub root: bool,
    /// Design-time seed node, rehydrated with a fresh ID after load
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_node: bool,
}

fn default_width() -> f32 {
    DEFAULT_NODE_WIDTH
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Node {
    /// Create an unconnected node of a type at a position
    pub fn new(id: NodeId, node_type: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            x,
            y,
            width: DEFAULT_NODE_WIDTH,
            input_data: InputData::new(),
            connections: Connections::default(),
            root: false,
            default_node: false,
        }
    }

    /// Control data of one port
    pub fn port_data(&self, port_name: &str) -> Option<&ControlData> {
        self.input_data.get(port_name)
    }
}
