//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! execute commands, read/write files, list directories, etc.
//!
//! A tool returns a JSON object shaped `{ success?, ...fields, error? }`.
//! A missing `success` field counts as success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ToolError;

/// Registration metadata for a tool, as shown to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,

    /// Whether a successful call ends the current task (informational
    /// reads and listings).
    #[serde(default)]
    pub terminal: bool,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "executeCommand", "readFile").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether a successful result from this tool completes the task.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Execute the tool with the given parameters object.
    async fn execute(
        &self,
        parameters: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Registration metadata for this tool.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
            terminal: self.is_terminal(),
        }
    }
}

/// Whether a tool result counts as a success (`success !== false`).
pub fn tool_succeeded(result: &serde_json::Value) -> bool {
    !matches!(result.get("success"), Some(serde_json::Value::Bool(false)))
}

/// The explicit registration table of available tools.
///
/// Every entry is validated when it is registered, so nothing probes a
/// tool's shape at call time. Names are kept ordered so the tool list in
/// prompts is stable between runs.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Rejects duplicates and malformed metadata.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let spec = tool.spec();
        if spec.name.trim().is_empty() {
            return Err(ToolError::InvalidRegistration("tool name is empty".into()));
        }
        if spec.description.trim().is_empty() {
            return Err(ToolError::InvalidRegistration(format!(
                "tool '{}' has no description",
                spec.name
            )));
        }
        if !spec.parameters.is_object() {
            return Err(ToolError::InvalidRegistration(format!(
                "tool '{}' parameter schema must be a JSON object",
                spec.name
            )));
        }
        if self.tools.contains_key(&spec.name) {
            return Err(ToolError::InvalidRegistration(format!(
                "tool '{}' is registered twice",
                spec.name
            )));
        }
        self.tools.insert(spec.name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Registration metadata for every tool, ordered by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// Whether `name` is registered and declared terminal.
    pub fn is_terminal(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.is_terminal())
    }

    /// Invoke a tool by name.
    ///
    /// Unknown names and non-object parameters are caller errors.
    pub async fn invoke(
        &self,
        name: &str,
        parameters: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        if !parameters.is_object() {
            return Err(ToolError::InvalidArguments(format!(
                "parameters for '{name}' must be a JSON object"
            )));
        }
        tool.execute(parameters).await
    }

    /// List all registered tool names, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
