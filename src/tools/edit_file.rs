//! edit_file tool - Replace a specific string in a file

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolError, ToolResult};

pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Replace a specific string in a file. Requires prior read_file call."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact string to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement string"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let path = input["path"].as_str().ok_or_else(|| eyre!("path is required"))?;
        let old_string = input["old_string"]
            .as_str()
            .ok_or_else(|| eyre!("old_string is required"))?;
        let new_string = input["new_string"]
            .as_str()
            .ok_or_else(|| eyre!("new_string is required"))?;
        let replace_all = input["replace_all"].as_bool().unwrap_or(false);

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        if !ctx.was_read(&full_path).await {
            let refused = ToolError::EditWithoutRead { path: path.to_string() };
            return Ok(ToolResult::error(refused.to_string()));
        }

        let content = tokio::fs::read_to_string(&full_path).await?;

        if old_string.is_empty() || !content.contains(old_string) {
            return Ok(ToolResult::error(
                "old_string not found in file. Make sure it matches exactly including whitespace.",
            ));
        }

        let count = content.matches(old_string).count();
        if !replace_all && count > 1 {
            return Ok(ToolResult::error(format!(
                "old_string found {} times. Use replace_all=true or provide more context.",
                count
            )));
        }

        let new_content = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        tokio::fs::write(&full_path, &new_content).await?;
        ctx.track_write(&full_path).await;

        let replacements = if replace_all { count } else { 1 };
        Ok(ToolResult::success(format!(
            "Replaced {} occurrence(s) in {}",
            replacements, path
        )))
    }
}
