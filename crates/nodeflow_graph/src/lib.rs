// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless node-graph engine.
//!
//! This crate provides the model behind a node editor:
//! - A registry of typed ports and node types
//! - An immutable graph transition function for every editing action
//! - A pull-based evaluator driven by host callbacks
//! - Comments, selection and persisted editor settings
//!
//! ## Architecture
//!
//! The graph is a map of nodes, each holding the edge records of both its
//! sides. Every transition returns a fresh [`Graph`] and shares untouched
//! nodes with the previous one, so keeping history is cheap. Rendering and
//! input handling are left to the host.

pub mod comment;
pub mod connection;
pub mod evaluation;
pub mod graph;
pub mod graphs;
pub mod ids;
pub mod mutation;
pub mod node;
pub mod port;
pub mod registry;
pub mod selection;
pub mod settings;

/// Arbitrary host data passed to port resolvers and host callbacks
pub type Context = serde_json::Value;

pub use comment::{comment_transition, Comment, CommentAction, CommentColor, Comments};
pub use connection::{Connections, PortRef, TransputType};
pub use evaluation::{EvaluationError, FnHost, LoopError, NodeHost, PortValues, ResolveOptions, RootEngine};
pub use graph::Graph;
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use mutation::{
    default_input_data, reconcile_nodes, transition, CircularBehavior, GraphAction, MutatorEnv, Notification,
    NotificationLevel, Transition,
};
pub use node::{ControlData, InputData, Node, NodeId, NodeType, PortList};
pub use port::{ControlKind, ControlOption, ControlSpec, ControlValue, PortColor, PortSpec, PortType, SetValueFn};
pub use registry::{Registry, RegistryError, RemovePortTypeOptions};
pub use selection::{Selection, SelectionAction};
pub use settings::{EditorSettings, SettingsError};
