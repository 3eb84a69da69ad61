// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic graph.
//!
//! A small schema over `f64` values: constants, the four basic operations, a
//! variadic sum whose term count is a control, a boolean switch and one root
//! `output` node. [`MathHost`] evaluates it.

use crate::connection::Connections;
use crate::evaluation::{NodeHost, PortValues};
use crate::node::{ControlData, InputData, Node, NodeType};
use crate::port::{ControlSpec, ControlValue, PortColor, PortSpec, PortType};
use crate::registry::{Registry, RegistryError};
use crate::Context;

/// Terms of a fresh `sum` node
pub const DEFAULT_SUM_TERMS: usize = 2;

/// Upper bound on `sum` terms
pub const MAX_SUM_TERMS: usize = 16;

fn number_port_type() -> PortType {
    PortType::new("number", "number")
        .with_label("Number")
        .with_color(PortColor::Red)
        .accepting(["number", "boolean"])
        .with_control(ControlSpec::number("number", "Number"))
}

fn boolean_port_type() -> PortType {
    PortType::new("boolean", "boolean")
        .with_label("True/False")
        .with_color(PortColor::Blue)
        .with_control(ControlSpec::checkbox("boolean", "True/False"))
}

fn binary_operation(type_name: &str, label: &str, description: &str, sort_index: i32) -> NodeType {
    let number = number_port_type();
    NodeType::new(type_name)
        .label(label)
        .description(description)
        .sort_index(sort_index)
        .inputs(vec![
            number.port().name("num1").label("Number 1"),
            number.port().name("num2").label("Number 2"),
        ])
        .outputs(vec![number.port().name("result").label("Result")])
}

/// Number of terms a `sum` node currently has
fn sum_terms(data: &InputData) -> usize {
    data.get("count")
        .and_then(|c| c.get("number"))
        .and_then(ControlValue::as_f64)
        .map_or(DEFAULT_SUM_TERMS, |n| n.max(0.0).round() as usize)
        .min(MAX_SUM_TERMS)
}

fn sum_inputs(data: &InputData, _: &Connections, _: &Context) -> Vec<PortSpec> {
    let count = PortSpec::new("number", "count")
        .label("Terms")
        .hide_port()
        .controls(vec![ControlSpec::number("number", "Terms")
            .with_default(DEFAULT_SUM_TERMS as f64)
            .with_range(0.0, MAX_SUM_TERMS as f64, 1.0)]);

    let mut ports = vec![count];
    ports.extend((1..=sum_terms(data)).map(|i| PortSpec::new("number", format!("n{i}")).label(format!("Number {i}"))));
    ports
}

/// Build the arithmetic registry
pub fn math_registry() -> Result<Registry, RegistryError> {
    let number = number_port_type();
    let boolean = boolean_port_type();

    let mut registry = Registry::new();
    registry
        .add_port_type(number.clone())?
        .add_port_type(boolean.clone())?
        .add_node_type(
            NodeType::new("number")
                .label("Number")
                .description("Outputs a numeric value")
                .sort_index(0)
                .initial_width(160.0)
                .inputs(vec![number.port().hide_port()])
                .outputs(vec![number.port()]),
        )?
        .add_node_type(
            NodeType::new("boolean")
                .label("True/False")
                .description("Outputs 1 when checked, 0 otherwise")
                .sort_index(1)
                .initial_width(160.0)
                .inputs(vec![boolean.port().hide_port()])
                .outputs(vec![boolean.port()]),
        )?
        .add_node_type(binary_operation("add", "Add", "Adds two numbers", 10))?
        .add_node_type(binary_operation("subtract", "Subtract", "Subtracts one number from another", 11))?
        .add_node_type(binary_operation("multiply", "Multiply", "Multiplies two numbers", 12))?
        .add_node_type(binary_operation(
            "divide",
            "Divide",
            "Divides one number by another, 0 when dividing by 0",
            13,
        ))?
        .add_node_type(
            NodeType::new("sum")
                .label("Sum")
                .description("Adds any number of numbers")
                .sort_index(20)
                .dynamic_inputs(sum_inputs)
                .outputs(vec![number.port().name("result").label("Result")]),
        )?
        .add_node_type(
            NodeType::new("switch")
                .label("Switch")
                .description("Picks one of two numbers")
                .sort_index(30)
                .inputs(vec![
                    boolean.port().name("test").label("Test"),
                    number.port().name("a").label("If true"),
                    number.port().name("b").label("If false"),
                ])
                .outputs(vec![number.port().name("result").label("Result")]),
        )?
        .add_root_node_type(
            NodeType::new("output")
                .label("Output")
                .description("The value of the graph")
                .inputs(vec![number.port().name("result").label("Result")]),
        )?;

    Ok(registry)
}

/// Evaluates [`math_registry`] graphs to `f64`
#[derive(Debug, Clone, Copy, Default)]
pub struct MathHost;

impl NodeHost for MathHost {
    type Value = f64;

    fn resolve_input_controls(&self, port_type: &str, data: &ControlData, _context: &Context) -> f64 {
        match port_type {
            "boolean" => data
                .get("boolean")
                .and_then(ControlValue::as_bool)
                .map_or(0.0, |b| if b { 1.0 } else { 0.0 }),
            _ => data.get("number").and_then(ControlValue::as_f64).unwrap_or(0.0),
        }
    }

    fn fire_node_function(
        &self,
        node: &Node,
        inputs: &PortValues<f64>,
        _node_type: &NodeType,
        _context: &Context,
    ) -> PortValues<f64> {
        let input = |name: &str| inputs.get(name).copied().unwrap_or(0.0);

        let (port, value) = match node.node_type.as_str() {
            "number" => ("number", input("number")),
            "boolean" => ("boolean", input("boolean")),
            "add" => ("result", input("num1") + input("num2")),
            "subtract" => ("result", input("num1") - input("num2")),
            "multiply" => ("result", input("num1") * input("num2")),
            "divide" => {
                let divisor = input("num2");
                ("result", if divisor == 0.0 { 0.0 } else { input("num1") / divisor })
            }
            "sum" => (
                "result",
                inputs
                    .iter()
                    .filter(|(name, _)| name.as_str() != "count")
                    .map(|(_, value)| value)
                    .sum(),
            ),
            "switch" => ("result", if input("test") != 0.0 { input("a") } else { input("b") }),
            other => {
                tracing::warn!("Math host cannot fire node {} of type \"{other}\"", node.id);
                return PortValues::new();
            }
        };

        PortValues::from([(port.to_string(), value)])
    }
}
