// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port types, port specs and the controls bound to unconnected inputs.

use crate::node::InputData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Colour a port is drawn with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortColor {
    /// Yellow
    Yellow,
    /// Orange
    Orange,
    /// Red
    Red,
    /// Pink
    Pink,
    /// Purple
    Purple,
    /// Blue
    Blue,
    /// Green
    Green,
    /// Neutral grey
    #[default]
    Grey,
}

impl PortColor {
    /// Get the RGB triple for this colour (for hosts that draw)
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            Self::Yellow => [210, 186, 87],
            Self::Orange => [250, 140, 64],
            Self::Red => [223, 78, 78],
            Self::Pink => [234, 124, 185],
            Self::Purple => [154, 103, 219],
            Self::Blue => [78, 150, 232],
            Self::Green => [90, 193, 107],
            Self::Grey => [161, 161, 161],
        }
    }
}

/// Kind of value editor a control represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Free text
    Text,
    /// Numeric value
    Number,
    /// Boolean toggle
    Checkbox,
    /// Single choice from `options`
    Select,
    /// Multiple choices from `options`
    #[serde(rename = "multiselect")]
    MultiSelect,
    /// Host-defined editor
    Custom,
}

/// Value stored for a control in a node's input data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// Text
    Text(String),
    /// List of text values (multiselect)
    List(Vec<String>),
    /// Anything else
    Json(serde_json::Value),
}

impl ControlValue {
    /// Get the value as a number, if it is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the value as a boolean, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as text, if it is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ControlValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ControlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ControlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ControlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One choice of a select/multiselect control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlOption {
    /// Display label
    pub label: String,
    /// Stored value
    pub value: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ControlOption {
    /// Create an option
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
        }
    }
}

/// Replaces a node's whole input data when one of its controls changes.
///
/// Called with `(new_input_data, old_input_data)`.
#[derive(Clone)]
pub struct SetValueFn(Arc<dyn Fn(&InputData, &InputData) -> InputData + Send + Sync>);

impl SetValueFn {
    /// Wrap a function
    pub fn new(f: impl Fn(&InputData, &InputData) -> InputData + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the function
    pub fn call(&self, new_data: &InputData, old_data: &InputData) -> InputData {
        (self.0)(new_data, old_data)
    }
}

impl fmt::Debug for SetValueFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SetValueFn(..)")
    }
}

/// Control definition for an input port
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSpec {
    /// Editor kind
    #[serde(rename = "type")]
    pub kind: ControlKind,
    /// Key in the port's input data
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Value a fresh node starts with
    pub default_value: ControlValue,
    /// Choices for select/multiselect
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ControlOption>,
    /// Numeric step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Numeric lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Numeric upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Input-data override for interdependent controls
    #[serde(skip)]
    pub set_value: Option<SetValueFn>,
}

impl ControlSpec {
    fn with_kind(kind: ControlKind, name: impl Into<String>, label: impl Into<String>, default_value: ControlValue) -> Self {
        Self {
            kind,
            name: name.into(),
            label: label.into(),
            default_value,
            options: Vec::new(),
            step: None,
            min: None,
            max: None,
            set_value: None,
        }
    }

    /// Text control, defaults to `""`
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(ControlKind::Text, name, label, ControlValue::Text(String::new()))
    }

    /// Number control, defaults to `0`
    pub fn number(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(ControlKind::Number, name, label, ControlValue::Number(0.0))
    }

    /// Checkbox control, defaults to `false`
    pub fn checkbox(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(ControlKind::Checkbox, name, label, ControlValue::Bool(false))
    }

    /// Select control, defaults to the first option's value
    pub fn select(name: impl Into<String>, label: impl Into<String>, options: Vec<ControlOption>) -> Self {
        let default_value = ControlValue::Text(options.first().map(|o| o.value.clone()).unwrap_or_default());
        Self {
            options,
            ..Self::with_kind(ControlKind::Select, name, label, default_value)
        }
    }

    /// Multiselect control, defaults to no selection
    pub fn multiselect(name: impl Into<String>, label: impl Into<String>, options: Vec<ControlOption>) -> Self {
        Self {
            options,
            ..Self::with_kind(ControlKind::MultiSelect, name, label, ControlValue::List(Vec::new()))
        }
    }

    /// Host-defined control
    pub fn custom(name: impl Into<String>, label: impl Into<String>, default_value: ControlValue) -> Self {
        Self::with_kind(ControlKind::Custom, name, label, default_value)
    }

    /// Override the default value
    pub fn with_default(mut self, value: impl Into<ControlValue>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Set numeric bounds and step
    pub fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self
    }

    /// Attach a `set_value` override
    pub fn with_set_value(
        mut self,
        f: impl Fn(&InputData, &InputData) -> InputData + Send + Sync + 'static,
    ) -> Self {
        self.set_value = Some(SetValueFn::new(f));
        self
    }
}

/// Port type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortType {
    /// Unique type identifier
    #[serde(rename = "type")]
    pub type_name: String,
    /// Default port name
    #[serde(default)]
    pub name: String,
    /// Default port label
    #[serde(default)]
    pub label: String,
    /// Port colour
    #[serde(default)]
    pub color: PortColor,
    /// Output port types this port accepts (empty means only itself)
    #[serde(default)]
    pub accept_types: Vec<String>,
    /// Controls shown when the port is unconnected
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
}

impl PortType {
    /// Create a port type with the given type identifier and default port name
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            label: String::new(),
            color: PortColor::default(),
            accept_types: Vec::new(),
            controls: Vec::new(),
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the colour
    pub fn with_color(mut self, color: PortColor) -> Self {
        self.color = color;
        self
    }

    /// Set the accepted output types
    pub fn accepting<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Add a control
    pub fn with_control(mut self, control: ControlSpec) -> Self {
        self.controls.push(control);
        self
    }

    /// Whether an output of `output_type` may feed a port of this type
    pub fn accepts(&self, output_type: &str) -> bool {
        if self.accept_types.is_empty() {
            return self.type_name == output_type;
        }
        self.accept_types.iter().any(|t| t == output_type)
    }

    /// Start a port spec that uses this type's name, label and colour
    pub fn port(&self) -> PortSpec {
        PortSpec {
            port_type: self.type_name.clone(),
            name: self.name.clone(),
            label: self.label.clone(),
            color: self.color,
            no_controls: false,
            hide_port: false,
            controls: None,
        }
    }
}

/// A port as declared on a node type: a port type plus local overrides
#[derive(Debug, Clone)]
pub struct PortSpec {
    /// Port type identifier
    pub port_type: String,
    /// Port name (key in input data and connections)
    pub name: String,
    /// Display label
    pub label: String,
    /// Colour
    pub color: PortColor,
    /// Show no controls even if the port type has some
    pub no_controls: bool,
    /// Hide the port handle (controls only)
    pub hide_port: bool,
    /// Controls replacing the port type's; `None` inherits them
    pub controls: Option<Vec<ControlSpec>>,
}

impl PortSpec {
    /// Create a spec by port type identifier and name
    pub fn new(port_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            port_type: port_type.into(),
            name: name.into(),
            label: String::new(),
            color: PortColor::default(),
            no_controls: false,
            hide_port: false,
            controls: None,
        }
    }

    /// Override the name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Override the colour
    pub fn color(mut self, color: PortColor) -> Self {
        self.color = color;
        self
    }

    /// Drop all controls
    pub fn no_controls(mut self) -> Self {
        self.no_controls = true;
        self
    }

    /// Hide the port handle
    pub fn hide_port(mut self) -> Self {
        self.hide_port = true;
        self
    }

    /// Replace the controls
    pub fn controls(mut self, controls: Vec<ControlSpec>) -> Self {
        self.controls = Some(controls);
        self
    }

    /// Controls in effect for this port, falling back to its port type's
    pub fn effective_controls<'a>(&'a self, port_type: Option<&'a PortType>) -> &'a [ControlSpec] {
        if self.no_controls {
            return &[];
        }
        match (&self.controls, port_type) {
            (Some(controls), _) => controls,
            (None, Some(port_type)) => &port_type.controls,
            (None, None) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_defaults_to_self() {
        let number = PortType::new("number", "number");
        assert!(number.accepts("number"));
        assert!(!number.accepts("string"));

        let any = PortType::new("any", "value").accepting(["number", "string"]);
        assert!(any.accepts("string"));
        assert!(!any.accepts("any"));
    }

    #[test]
    fn test_control_defaults() {
        assert_eq!(ControlSpec::text("t", "T").default_value, ControlValue::Text(String::new()));
        assert_eq!(ControlSpec::number("n", "N").default_value, ControlValue::Number(0.0));
        assert_eq!(ControlSpec::checkbox("c", "C").default_value, ControlValue::Bool(false));
        let select = ControlSpec::select(
            "s",
            "S",
            vec![ControlOption::new("Add", "add"), ControlOption::new("Sub", "sub")],
        );
        assert_eq!(select.default_value, ControlValue::Text("add".to_string()));
        assert_eq!(ControlSpec::multiselect("m", "M", vec![]).default_value, ControlValue::List(vec![]));
    }

    #[test]
    fn test_effective_controls() {
        let number = PortType::new("number", "number").with_control(ControlSpec::number("number", "Number"));
        assert_eq!(number.port().effective_controls(Some(&number)).len(), 1);
        assert!(number.port().no_controls().effective_controls(Some(&number)).is_empty());
        let replaced = number.port().controls(vec![ControlSpec::text("a", "A"), ControlSpec::text("b", "B")]);
        assert_eq!(replaced.effective_controls(Some(&number)).len(), 2);
    }

    #[test]
    fn test_control_value_untagged() {
        let v: ControlValue = serde_json::from_str("4.5").unwrap();
        assert_eq!(v, ControlValue::Number(4.5));
        let v: ControlValue = serde_json::from_str("[\"a\"]").unwrap();
        assert_eq!(v, ControlValue::List(vec!["a".to_string()]));
        let v: ControlValue = serde_json::from_str("{\"k\":1}").unwrap();
        assert!(matches!(v, ControlValue::Json(_)));
    }
}
