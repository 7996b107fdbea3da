//! Command tool — execute a shell command with a timeout.
//!
//! A non-zero exit status is reported as `success: false`; only failing to
//! spawn the process or running past the timeout is a tool error.

use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::required_str;

const NAME: &str = "executeCommand";

/// Execute shell commands.
pub struct ExecuteCommandTool {
    timeout: Duration,
    /// If non-empty, only these base commands are allowed.
    allowed_commands: Vec<String>,
}

impl ExecuteCommandTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            allowed_commands: Vec::new(),
        }
    }

    pub fn with_allowed_commands(mut self, allowed: Vec<String>) -> Self {
        self.allowed_commands = allowed;
        self
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }
        let base_cmd = command.split_whitespace().next().unwrap_or("");
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its exit code, stdout and stderr."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory (optional)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let command = required_str(&parameters, "command")?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: NAME.into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);
        if let Some(dir) = parameters.get("cwd").and_then(serde_json::Value::as_str) {
            cmd.current_dir(PathBuf::from(dir));
        }

        debug!(command = %command, timeout_secs = self.timeout.as_secs(), "Executing command");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: NAME.into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: NAME.into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let code = output.status.code().unwrap_or(-1);

        if output.status.success() {
            Ok(json!({
                "success": true,
                "command": command,
                "exitCode": code,
                "stdout": stdout,
                "stderr": stderr,
            }))
        } else {
            warn!(command = %command, exit_code = code, "Command failed");
            Ok(json!({
                "success": false,
                "command": command,
                "exitCode": code,
                "stdout": stdout,
                "stderr": stderr,
                "error": format!("Command failed with exit code {code}"),
            }))
        }
    }
}
