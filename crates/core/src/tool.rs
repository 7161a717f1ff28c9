//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! scrape pages, capture screenshots, read/write files, run commands.
//! Each tool declares a JSON Schema for its parameters; the registry checks
//! required fields and primitive types before the tool ever runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use crate::error::ToolError;

/// Parameters passed to a tool: the `params` object of a tool-call directive.
pub type ToolParams = Map<String, Value>;

/// A tool definition, rendered into the system prompt so the model knows
/// what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// An image file produced by a tool, inlined into the next model message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// Short label shown next to the image (e.g. the viewport name)
    pub label: String,

    /// Where the image was written
    pub path: PathBuf,
}

/// Successful output of a tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Tool-specific JSON result, opaque to the agent loop
    pub value: Value,

    /// Image files to show the model alongside `value`
    pub images: Vec<ImageArtifact>,
}

impl ToolOutput {
    pub fn json(value: Value) -> Self {
        Self {
            value,
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.images.push(ImageArtifact {
            label: label.into(),
            path: path.into(),
        });
        self
    }
}

/// The core Tool trait.
///
/// Every named capability (`files.read`, `system.run`, ...) implements this
/// trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "files.read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: ToolParams) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for the system prompt.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, fixed once the agent is built.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate `params` against the named tool's schema, then execute it.
    pub async fn invoke(&self, name: &str, params: ToolParams) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        validate_params(&tool.parameters_schema(), &params)?;
        tool.execute(params).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `params` against the `required` list and the primitive `type` of
/// each declared property. Unknown extra keys are allowed.
pub fn validate_params(schema: &Value, params: &ToolParams) -> std::result::Result<(), ToolError> {
    if let Some(required) = schema["required"].as_array() {
        for field in required.iter().filter_map(Value::as_str) {
            match params.get(field) {
                None | Some(Value::Null) => return Err(ToolError::missing_field(field)),
                Some(_) => {}
            }
        }
    }

    let Some(properties) = schema["properties"].as_object() else {
        return Ok(());
    };

    for (field, value) in params {
        if value.is_null() {
            continue;
        }
        let Some(expected) = properties.get(field).and_then(|p| p["type"].as_str()) else {
            continue;
        };
        let ok = match expected {
            "string" => value.is_string(),
            "boolean" => value.is_boolean(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !ok {
            return Err(ToolError::InvalidArguments(format!(
                "field '{field}' must be of type {expected}"
            )));
        }
    }

    Ok(())
}

// --- Parameter accessors ---

/// A required string parameter.
pub fn required_str<'a>(params: &'a ToolParams, field: &str) -> std::result::Result<&'a str, ToolError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::missing_field(field))
}

pub fn optional_str<'a>(params: &'a ToolParams, field: &str) -> Option<&'a str> {
    params.get(field).and_then(Value::as_str)
}

pub fn optional_bool(params: &ToolParams, field: &str) -> Option<bool> {
    params.get(field).and_then(Value::as_bool)
}

pub fn optional_u64(params: &ToolParams, field: &str) -> Option<u64> {
    params.get(field).and_then(Value::as_u64)
}

/// A list of strings; non-string entries are skipped. `None` if absent.
pub fn string_list(params: &ToolParams, field: &str) -> Option<Vec<String>> {
    params.get(field).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}
