//! read_file tool - Read file contents with line numbers

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolResult};

const MAX_LINE_CHARS: usize = 2000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a file's contents with line numbers. Required before editing."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max lines to read (default: 2000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let path = input["path"].as_str().ok_or_else(|| eyre!("path is required"))?;
        let offset = input["offset"].as_u64().unwrap_or(1).max(1) as usize;
        let limit = input["limit"].as_u64().unwrap_or(2000) as usize;

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(e) => return Ok(ToolResult::error(format!("Failed to read file '{}': {}", path, e))),
        };

        ctx.track_read(&full_path).await;

        // cat -n style
        let lines: Vec<_> = content
            .lines()
            .skip(offset - 1)
            .take(limit)
            .enumerate()
            .map(|(i, line)| {
                let truncated = match line.char_indices().nth(MAX_LINE_CHARS) {
                    Some((cut, _)) => format!("{}...", &line[..cut]),
                    None => line.to_string(),
                };
                format!("{:>6}|{}", offset + i, truncated)
            })
            .collect();

        if lines.is_empty() {
            Ok(ToolResult::success("(empty file)"))
        } else {
            Ok(ToolResult::success(lines.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_file_basic() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");
        std::fs::write(dir.path().join("test.txt"), "a\nb\nc").unwrap();

        let result = ReadFileTool
            .execute(serde_json::json!({"path": "test.txt"}), &ctx)
            .await
            .unwrap();

        assert!(!result.is_error);
        assert!(result.content.contains("1|a"));
        assert!(result.content.contains("3|c"));
    }

    #[tokio::test]
    async fn test_read_file_with_offset_and_limit() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");
        std::fs::write(dir.path().join("test.txt"), "line 1\nline 2\nline 3\nline 4\nline 5").unwrap();

        let result = ReadFileTool
            .execute(serde_json::json!({"path": "test.txt", "offset": 2, "limit": 2}), &ctx)
            .await
            .unwrap();

        assert!(!result.content.contains("line 1"));
        assert!(result.content.contains("2|line 2"));
        assert!(result.content.contains("3|line 3"));
        assert!(!result.content.contains("line 4"));
    }

    #[tokio::test]
    async fn test_read_file_not_found_is_tool_error() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");

        let result = ReadFileTool
            .execute(serde_json::json!({"path": "nonexistent.txt"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Failed to read file"));
    }

    #[tokio::test]
    async fn test_read_file_outside_root() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");

        let result = ReadFileTool
            .execute(serde_json::json!({"path": "../../etc/passwd"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("escapes repository root"));
    }

    #[tokio::test]
    async fn test_read_file_tracks_read() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");
        let test_file = dir.path().join("test.txt");
        std::fs::write(&test_file, "content").unwrap();

        assert!(!ctx.was_read(&test_file).await);
        ReadFileTool
            .execute(serde_json::json!({"path": "test.txt"}), &ctx)
            .await
            .unwrap();
        assert!(ctx.was_read(&test_file).await);
    }

    #[tokio::test]
    async fn test_long_multibyte_line_is_cut_safely() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");
        std::fs::write(dir.path().join("wide.txt"), "ü".repeat(3000)).unwrap();

        let result = ReadFileTool
            .execute(serde_json::json!({"path": "wide.txt"}), &ctx)
            .await
            .unwrap();
        assert!(result.content.ends_with("..."));
    }

    #[tokio::test]
    async fn test_missing_path_is_err() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");
        assert!(ReadFileTool.execute(serde_json::json!({}), &ctx).await.is_err());
    }
}
