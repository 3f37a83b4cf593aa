//! Tool schema registry.
//!
//! A registry is a static table of callable operations. It serializes to the
//! `tools` array of a `session.update` event and validates the argument
//! objects the model sends back.

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::core::realtime::openai::{ClientEvent, DEFAULT_TOOL_CHOICE, SessionConfig, ToolDef};

/// Why a function call was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The model called a tool that is not in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments could not be parsed or violate the tool schema
    #[error("Malformed call to {name}: {reason}")]
    Malformed { name: String, reason: String },
}

impl CallError {
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CallError::Malformed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Primitive JSON schema types used by tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
}

impl ParamType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
        }
    }
}

/// One named argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub description: &'static str,
    pub required: bool,
    /// Inclusive bounds for numeric parameters
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl ParamSpec {
    pub fn new(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            description,
            required: false,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Number, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.param_type,
            "description": self.description,
        });
        if let Some(object) = schema.as_object_mut() {
            if let Some(minimum) = self.minimum {
                object.insert("minimum".to_string(), json!(minimum));
            }
            if let Some(maximum) = self.maximum {
                object.insert("maximum".to_string(), json!(maximum));
            }
        }
        schema
    }
}

/// One callable operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// JSON schema of the arguments object.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef {
            tool_type: "function".to_string(),
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            parameters: Some(self.parameters_schema()),
        }
    }

    fn validate(&self, args: &Value) -> Result<(), CallError> {
        let Some(object) = args.as_object() else {
            return Err(CallError::malformed(self.name, "arguments are not an object"));
        };

        for param in &self.params {
            let value = object.get(param.name).filter(|v| !v.is_null());
            let Some(value) = value else {
                if param.required {
                    return Err(CallError::malformed(
                        self.name,
                        format!("missing required argument `{}`", param.name),
                    ));
                }
                continue;
            };

            if !param.param_type.accepts(value) {
                return Err(CallError::malformed(
                    self.name,
                    format!(
                        "argument `{}` must be of type {:?}",
                        param.name, param.param_type
                    ),
                ));
            }

            if let (Some(minimum), Some(n)) = (param.minimum, value.as_f64())
                && n < minimum
            {
                return Err(CallError::malformed(
                    self.name,
                    format!("argument `{}` must be at least {minimum}", param.name),
                ));
            }

            if let (Some(maximum), Some(n)) = (param.maximum, value.as_f64())
                && n > maximum
            {
                return Err(CallError::malformed(
                    self.name,
                    format!("argument `{}` must be at most {maximum}", param.name),
                ));
            }
        }
        Ok(())
    }
}

/// Session options announced alongside the tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub tool_choice: String,
    pub voice: Option<String>,
    pub instructions: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tool_choice: DEFAULT_TOOL_CHOICE.to_string(),
            voice: None,
            instructions: None,
        }
    }
}

/// Immutable table of tools for one domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolSpec>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.iter().map(|t| t.name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.tools.iter().map(ToolSpec::to_tool_def).collect()
    }

    pub fn session_config(&self, options: &SessionOptions) -> SessionConfig {
        SessionConfig {
            instructions: options.instructions.clone(),
            voice: options.voice.clone(),
            tools: Some(self.tool_defs()),
            tool_choice: Some(options.tool_choice.clone()),
        }
    }

    /// The `session.update` event announcing this registry.
    pub fn session_update(&self, options: &SessionOptions) -> ClientEvent {
        ClientEvent::SessionUpdate {
            session: self.session_config(options),
        }
    }

    /// Check a parsed argument object against the named tool's schema.
    pub fn validate(&self, name: &str, args: &Value) -> Result<(), CallError> {
        self.get(name)
            .ok_or_else(|| CallError::UnknownTool(name.to_string()))?
            .validate(args)
    }
}
