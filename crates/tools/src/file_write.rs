//! File write tool — create, overwrite or append to a file.

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;
use tokio::io::AsyncWriteExt;

use crate::required_str;

#[derive(Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }

    async fn write(path: &str, content: &str, append: bool) -> std::io::Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        if append {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await
        } else {
            tokio::fs::write(path, content).await
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories as needed. Set append to add to the end instead of replacing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write"
                },
                "content": {
                    "type": "string",
                    "description": "The text to write"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwrite (default false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path = required_str(&parameters, "path")?;
        let content = required_str(&parameters, "content")?;
        let append = parameters
            .get("append")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        match Self::write(path, content, append).await {
            Ok(()) => Ok(json!({
                "success": true,
                "path": path,
                "bytesWritten": content.len(),
                "append": append,
            })),
            Err(e) => Ok(json!({
                "success": false,
                "path": path,
                "error": format!("Failed to write '{path}': {e}"),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/out.txt");
        let path_str = path.to_string_lossy().to_string();

        let result = WriteFileTool
            .execute(json!({"path": path_str, "content": "one"}))
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one");
    }

    #[tokio::test]
    async fn append_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        let path_str = path.to_string_lossy().to_string();

        WriteFileTool
            .execute(json!({"path": path_str, "content": "a"}))
            .await
            .unwrap();
        WriteFileTool
            .execute(json!({"path": path_str, "content": "b", "append": true}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ab");
    }

    #[tokio::test]
    async fn content_is_required() {
        let err = WriteFileTool
            .execute(json!({"path": "x.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
