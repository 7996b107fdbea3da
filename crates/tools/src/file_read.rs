//! File read tool — read a text file.

use async_trait::async_trait;
use serde_json::json;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

use crate::required_str;

/// Reads larger than this are truncated.
const MAX_READ_BYTES: usize = 256 * 1024;

#[derive(Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "readFile"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path = required_str(&parameters, "path")?;

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let truncated = bytes.len() > MAX_READ_BYTES;
                let shown = &bytes[..bytes.len().min(MAX_READ_BYTES)];
                Ok(json!({
                    "success": true,
                    "path": path,
                    "bytes": bytes.len(),
                    "truncated": truncated,
                    "content": String::from_utf8_lossy(shown),
                }))
            }
            Err(e) => Ok(json!({
                "success": false,
                "path": path,
                "error": format!("Failed to read '{path}': {e}"),
            })),
        }
    }
}
