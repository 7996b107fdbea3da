//! Built-in tool implementations for Stepwise.
//!
//! Tools give the agent the ability to interact with the world: run shell
//! commands, read and write files, and list directories. Every tool
//! returns a JSON object carrying a `success` flag.

pub mod file_read;
pub mod file_write;
pub mod list_directory;
pub mod shell;

use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::ToolRegistry;

pub use file_read::ReadFileTool;
pub use file_write::WriteFileTool;
pub use list_directory::ListDirectoryTool;
pub use shell::ExecuteCommandTool;

/// Create the registration table of built-in tools.
///
/// `readFile` and `listDirectory` are declared terminal: a successful
/// read or listing completes the task that asked for it.
pub fn default_registry(command_timeout: Duration) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ExecuteCommandTool::new(command_timeout)))?;
    registry.register(Box::new(ReadFileTool::new()))?;
    registry.register(Box::new(WriteFileTool::new()))?;
    registry.register(Box::new(ListDirectoryTool::new()))?;
    Ok(registry)
}

/// Read a required string parameter.
pub(crate) fn required_str<'a>(
    parameters: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    parameters
        .get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}
