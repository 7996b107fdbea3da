//! Directory listing tool.

use async_trait::async_trait;
use serde_json::json;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

#[derive(Default)]
pub struct ListDirectoryTool;

impl ListDirectoryTool {
    pub fn new() -> Self {
        Self
    }

    async fn list(path: &str) -> std::io::Result<Vec<serde_json::Value>> {
        let mut dir = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let kind = if meta.is_dir() {
                "directory"
            } else if meta.is_file() {
                "file"
            } else {
                "other"
            };
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "type": kind,
                "size": meta.len(),
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        Ok(entries)
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "listDirectory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory with their type and size."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: current directory)"
                }
            }
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path = parameters
            .get("path")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(".");

        match Self::list(path).await {
            Ok(entries) => Ok(json!({
                "success": true,
                "path": path,
                "count": entries.len(),
                "entries": entries,
            })),
            Err(e) => Ok(json!({
                "success": false,
                "path": path,
                "error": format!("Failed to list '{path}': {e}"),
            })),
        }
    }
}
