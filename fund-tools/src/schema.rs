//! Declarative function metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{ToolError, ToolResult};

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// Whole JSON number.
    Integer,
}

impl ParameterKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
        }
    }
}

/// One named parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    kind: ParameterKind,
    description: String,
    required: bool,
}

impl Parameter {
    /// Describes a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    /// Describes an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the JSON type.
    #[must_use]
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    /// Returns whether callers must supply the parameter.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Metadata describing one callable function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSchema {
    name: String,
    description: String,
    parameters: Vec<Parameter>,
}

impl FunctionSchema {
    /// Creates a schema without parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidSchema`] if the name is empty or contains
    /// characters other than ASCII letters, digits, and underscores.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> ToolResult<Self> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ToolError::InvalidSchema {
                reason: format!("function name `{name}` must be a non-empty identifier"),
            });
        }
        Ok(Self {
            name,
            description: description.into(),
            parameters: Vec::new(),
        })
    }

    /// Adds a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidSchema`] for a blank or repeated name.
    pub fn with_parameter(mut self, parameter: Parameter) -> ToolResult<Self> {
        if parameter.name.trim().is_empty() {
            return Err(ToolError::InvalidSchema {
                reason: format!("`{}` has a parameter without a name", self.name),
            });
        }
        if self.parameter(&parameter.name).is_some() {
            return Err(ToolError::InvalidSchema {
                reason: format!("`{}` declares `{}` twice", self.name, parameter.name),
            });
        }
        self.parameters.push(parameter);
        Ok(self)
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to the model.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Checks call arguments: an object, required keys present, known keys
    /// only, and values of the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] describing the first problem.
    pub fn validate(&self, arguments: &Value) -> ToolResult<()> {
        let Some(object) = arguments.as_object() else {
            return Err(ToolError::invalid_arguments(&self.name, "arguments must be a JSON object"));
        };
        for parameter in &self.parameters {
            match object.get(&parameter.name) {
                None | Some(Value::Null) if parameter.required => {
                    return Err(ToolError::invalid_arguments(
                        &self.name,
                        format!("missing `{}`", parameter.name),
                    ));
                }
                Some(value) if !value.is_null() && !parameter.kind.accepts(value) => {
                    return Err(ToolError::invalid_arguments(
                        &self.name,
                        format!("`{}` must be a {}", parameter.name, parameter.kind.as_str()),
                    ));
                }
                _ => {}
            }
        }
        if let Some(unknown) = object.keys().find(|key| self.parameter(key).is_none()) {
            return Err(ToolError::invalid_arguments(
                &self.name,
                format!("unexpected `{unknown}`"),
            ));
        }
        Ok(())
    }

    /// Renders the schema in the `functions` format chat completion APIs accept.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for parameter in &self.parameters {
            properties.insert(
                parameter.name.clone(),
                json!({
                    "type": parameter.kind,
                    "description": parameter.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
        })
    }
}
