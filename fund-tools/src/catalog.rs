//! The set of functions offered to the model.

use serde_json::Value;
use tracing::debug;

use crate::schema::{FunctionSchema, Parameter, ParameterKind};
use crate::{ToolError, ToolResult};

/// Name of the transfer function.
pub const SEND_USDC: &str = "send_usdc";

/// A function call requested by the model, checked against its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// Arguments object.
    pub arguments: Value,
}

/// Ordered collection of function schemas.
#[derive(Debug, Clone, Default)]
pub struct FunctionCatalog {
    functions: Vec<FunctionSchema>,
}

impl FunctionCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the catalog the relay assistant ships with.
    ///
    /// # Errors
    ///
    /// Only fails if one of the built-in schemas is malformed.
    pub fn standard() -> ToolResult<Self> {
        use ParameterKind::{Integer, Number, String};

        let mut catalog = Self::new();
        catalog.register(
            FunctionSchema::new("get_weather", "Get the current weather for a specified city")?
                .with_parameter(Parameter::required("city", String, "The name of the city"))?
                .with_parameter(Parameter::optional(
                    "country",
                    String,
                    "The country code (e.g., 'US', 'UK')",
                ))?,
        )?;
        catalog.register(
            FunctionSchema::new("set_reminder", "Set a reminder for the chat")?
                .with_parameter(Parameter::required("message", String, "What to remind about"))?
                .with_parameter(Parameter::required(
                    "when",
                    String,
                    "When to send the reminder, e.g. 'in 2 hours' or an ISO-8601 time",
                ))?,
        )?;
        catalog.register(
            FunctionSchema::new(
                "search_knowledge_base",
                "Search the ecosystem knowledge base for relevant documents",
            )?
            .with_parameter(Parameter::required("query", String, "Search terms"))?
            .with_parameter(Parameter::optional("limit", Integer, "Maximum number of results"))?,
        )?;
        catalog.register(FunctionSchema::new(
            "get_base_usdc_balance",
            "Get the current USDC balance of the assistant's Base account",
        )?)?;
        catalog.register(
            FunctionSchema::new(
                SEND_USDC,
                "Send USDC to a confirmed Base address. Only approved requests are executed.",
            )?
            .with_parameter(Parameter::required(
                "to_address",
                String,
                "Base address to send USDC to",
            ))?
            .with_parameter(Parameter::required("amount", Number, "Amount of USDC to send"))?,
        )?;
        Ok(catalog)
    }

    /// Adds a schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateFunction`] if the name is already present.
    pub fn register(&mut self, schema: FunctionSchema) -> ToolResult<()> {
        if self.get(schema.name()).is_some() {
            return Err(ToolError::DuplicateFunction {
                name: schema.name().to_owned(),
            });
        }
        self.functions.push(schema);
        Ok(())
    }

    /// Looks up a schema by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionSchema> {
        self.functions.iter().find(|schema| schema.name() == name)
    }

    /// Lists schemas in registration order.
    #[must_use]
    pub fn schemas(&self) -> &[FunctionSchema] {
        &self.functions
    }

    /// Renders every schema as a `functions` array.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.functions.iter().map(FunctionSchema::to_json).collect())
    }

    /// Parses a call the model produced. `arguments` is the raw JSON text the
    /// completion API returns; an empty string means no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownFunction`] for names outside the catalog
    /// and [`ToolError::InvalidArguments`] for malformed or mismatched
    /// arguments.
    pub fn parse_call(&self, name: &str, arguments: &str) -> ToolResult<FunctionCall> {
        let schema = self.get(name).ok_or_else(|| ToolError::UnknownFunction {
            name: name.to_owned(),
        })?;
        let arguments = if arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(arguments)
                .map_err(|err| ToolError::invalid_arguments(name, err.to_string()))?
        };
        schema.validate(&arguments)?;
        debug!(function = name, "function call accepted");
        Ok(FunctionCall {
            name: name.to_owned(),
            arguments,
        })
    }
}
