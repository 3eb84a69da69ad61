// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node and port types.
//!
//! Built once at startup and shared by the mutator and the evaluator. All
//! builder methods chain:
//!
//! ```
//! use nodeflow_graph::{NodeType, PortType, Registry};
//!
//! let number = PortType::new("number", "number");
//! let mut registry = Registry::new();
//! registry
//!     .add_port_type(number.clone())?
//!     .add_node_type(NodeType::new("double").inputs(vec![number.port()]).outputs(vec![number.port()]))?;
//! # Ok::<(), nodeflow_graph::RegistryError>(())
//! ```

use crate::node::NodeType;
use crate::port::PortType;
use indexmap::IndexMap;
use std::collections::HashSet;
use thiserror::Error;

/// Error when building the registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Type identifier missing or empty
    #[error("A {0} type must have a non-empty \"type\" string")]
    MissingType(&'static str),

    /// Node type already declared
    #[error("A node with type \"{0}\" has already been declared")]
    DuplicateNodeType(String),

    /// Port type already declared
    #[error("A port with type \"{0}\" has already been declared")]
    DuplicatePortType(String),

    /// Port type without a name
    #[error("Port type \"{0}\" must have a non-empty \"name\" string")]
    MissingPortName(String),

    /// Initial width is not a positive number
    #[error("Node type \"{node_type}\" has an invalid initial width: {width}")]
    InvalidInitialWidth {
        /// Node type
        node_type: String,
        /// Rejected width
        width: f32,
    },

    /// Port spec references an undeclared port type
    #[error("Node type \"{node_type}\" uses undeclared port type \"{port_type}\"")]
    UnknownPortType {
        /// Node type
        node_type: String,
        /// Missing port type
        port_type: String,
    },

    /// Two controls with the same name on one port type
    #[error("Port type \"{port_type}\" declares control \"{control}\" more than once")]
    DuplicateControl {
        /// Port type
        port_type: String,
        /// Repeated control name
        control: String,
    },

    /// Port type still used by node types
    #[error(
        "Cannot delete port type \"{port_type}\" without first deleting all node types using these ports: [{}]",
        .node_types.join(", ")
    )]
    ReferentialIntegrity {
        /// Port type being removed
        port_type: String,
        /// Node types still using it
        node_types: Vec<String>,
    },
}

impl RegistryError {
    /// Whether the error is a malformed or duplicate definition
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::ReferentialIntegrity { .. })
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Options for [`Registry::remove_port_type`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RemovePortTypeOptions {
    /// Skip the warning about node types with resolver-derived ports
    pub skip_dynamic_nodes_check: bool,
}

/// Registry of node and port types
#[derive(Debug, Clone, Default)]
pub struct Registry {
    node_types: IndexMap<String, NodeType>,
    port_types: IndexMap<String, PortType>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type
    pub fn add_node_type(&mut self, node_type: NodeType) -> Result<&mut Self> {
        if node_type.type_name.trim().is_empty() {
            return Err(RegistryError::MissingType("node"));
        }
        if self.node_types.contains_key(&node_type.type_name) {
            return Err(RegistryError::DuplicateNodeType(node_type.type_name));
        }
        if let Some(width) = node_type.initial_width {
            if !width.is_finite() || width <= 0.0 {
                return Err(RegistryError::InvalidInitialWidth {
                    node_type: node_type.type_name,
                    width,
                });
            }
        }
        let undeclared = [&node_type.inputs, &node_type.outputs]
            .into_iter()
            .filter_map(|ports| ports.static_ports())
            .flatten()
            .find(|port| !self.port_types.contains_key(&port.port_type))
            .map(|port| port.port_type.clone());
        if let Some(port_type) = undeclared {
            return Err(RegistryError::UnknownPortType {
                node_type: node_type.type_name,
                port_type,
            });
        }

        self.node_types.insert(node_type.type_name.clone(), node_type);
        Ok(self)
    }

    /// Register a root node type: forced root, not addable, not deletable
    pub fn add_root_node_type(&mut self, node_type: NodeType) -> Result<&mut Self> {
        self.add_node_type(NodeType {
            root: true,
            addable: false,
            deletable: false,
            ..node_type
        })
    }

    /// Remove a node type
    pub fn remove_node_type(&mut self, type_name: &str) -> &mut Self {
        if self.node_types.shift_remove(type_name).is_none() {
            tracing::warn!("Attempted to remove node type \"{type_name}\" which is not registered");
        }
        self
    }

    /// Register a port type
    pub fn add_port_type(&mut self, mut port_type: PortType) -> Result<&mut Self> {
        if port_type.type_name.trim().is_empty() {
            return Err(RegistryError::MissingType("port"));
        }
        if port_type.name.trim().is_empty() {
            return Err(RegistryError::MissingPortName(port_type.type_name));
        }
        if self.port_types.contains_key(&port_type.type_name) {
            return Err(RegistryError::DuplicatePortType(port_type.type_name));
        }
        let mut seen = HashSet::new();
        if let Some(control) = port_type.controls.iter().find(|c| !seen.insert(c.name.as_str())) {
            return Err(RegistryError::DuplicateControl {
                port_type: port_type.type_name.clone(),
                control: control.name.clone(),
            });
        }
        if port_type.accept_types.is_empty() {
            port_type.accept_types = vec![port_type.type_name.clone()];
        }

        self.port_types.insert(port_type.type_name.clone(), port_type);
        Ok(self)
    }

    /// Remove a port type no fixed node type uses anymore
    pub fn remove_port_type(&mut self, type_name: &str, options: RemovePortTypeOptions) -> Result<&mut Self> {
        if !self.port_types.contains_key(type_name) {
            tracing::warn!("Attempted to remove port type \"{type_name}\" which is not registered");
            return Ok(self);
        }
        if !options.skip_dynamic_nodes_check && self.node_types.values().any(NodeType::has_dynamic_ports) {
            tracing::warn!(
                "One or more node types resolve their ports dynamically; cannot verify that port type \"{type_name}\" is unused by them. \
                 Pass skip_dynamic_nodes_check to silence this warning"
            );
        }
        let node_types: Vec<String> = self
            .node_types
            .values()
            .filter(|n| n.uses_port_type(type_name))
            .map(|n| n.type_name.clone())
            .collect();
        if !node_types.is_empty() {
            return Err(RegistryError::ReferentialIntegrity {
                port_type: type_name.to_string(),
                node_types,
            });
        }

        self.port_types.shift_remove(type_name);
        Ok(self)
    }

    /// Get a node type by ID
    pub fn node_type(&self, type_name: &str) -> Option<&NodeType> {
        self.node_types.get(type_name)
    }

    /// Get a port type by ID
    pub fn port_type(&self, type_name: &str) -> Option<&PortType> {
        self.port_types.get(type_name)
    }

    /// Get all node types in registration order
    pub fn node_types(&self) -> impl Iterator<Item = &NodeType> {
        self.node_types.values()
    }

    /// Get all port types in registration order
    pub fn port_types(&self) -> impl Iterator<Item = &PortType> {
        self.port_types.values()
    }

    /// Node types offered in the add-node menu, by sort index then label
    pub fn addable_node_types(&self) -> Vec<&NodeType> {
        let mut types: Vec<&NodeType> = self.node_types.values().filter(|n| n.addable).collect();
        types.sort_by(|a, b| {
            let index = |n: &NodeType| n.sort_index.unwrap_or(i32::MAX);
            index(a).cmp(&index(b)).then_with(|| a.label.cmp(&b.label))
        });
        types
    }

    /// Whether an output of `output_type` may feed an input port of `input_type`.
    ///
    /// Unknown input port types accept nothing.
    pub fn accepts(&self, output_type: &str, input_type: &str) -> bool {
        self.port_type(input_type).is_some_and(|p| p.accepts(output_type))
    }
}
