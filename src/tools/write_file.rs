//! write_file tool - Write content to a file

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolResult};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file. Creates parent directories if needed."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let path = input["path"].as_str().ok_or_else(|| eyre!("path is required"))?;
        let content = input["content"].as_str().ok_or_else(|| eyre!("content is required"))?;

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, content).await?;
        ctx.track_write(&full_path).await;
        // Written content is known, so later edits need no read_file first
        ctx.track_read(&full_path).await;

        log::debug!("[{}] wrote {} bytes to {}", ctx.session_id, content.len(), path);
        Ok(ToolResult::success(format!("Wrote {} bytes to {}", content.len(), path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_file_basic() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");

        let result = WriteFileTool
            .execute(serde_json::json!({"path": "test.txt", "content": "Hello, World!"}), &ctx)
            .await
            .unwrap();

        assert!(!result.is_error);
        assert!(result.content.contains("13 bytes"));
        assert_eq!(std::fs::read_to_string(dir.path().join("test.txt")).unwrap(), "Hello, World!");
        assert_eq!(ctx.written_files().await, vec!["test.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_write_file_creates_directories() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");

        WriteFileTool
            .execute(
                serde_json::json!({"path": "subdir/nested/test.txt", "content": "Nested content"}),
                &ctx,
            )
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("subdir/nested/test.txt")).unwrap();
        assert_eq!(content, "Nested content");
        assert_eq!(ctx.written_files().await, vec!["subdir/nested/test.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_write_file_outside_root_refused() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");

        let result = WriteFileTool
            .execute(serde_json::json!({"path": "../escape.txt", "content": "x"}), &ctx)
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(ctx.written_files().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_file_missing_content() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");
        let result = WriteFileTool.execute(serde_json::json!({"path": "test.txt"}), &ctx).await;
        assert!(result.is_err());
    }
}
