//! list_directory tool - List files and directories in a path

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolResult};

const MAX_ENTRIES: usize = 500;

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "List files and directories in a path."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the repository root (default: .)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let path = input["path"].as_str().unwrap_or(".");
        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let mut dir = match tokio::fs::read_dir(&full_path).await {
            Ok(dir) => dir,
            Err(e) => return Ok(ToolResult::error(format!("Cannot list '{}': {}", path, e))),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let suffix = if entry.file_type().await?.is_dir() { "/" } else { "" };
            entries.push(format!("{}{}", name, suffix));
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ToolResult::success("(empty directory)"));
        }

        let total = entries.len();
        entries.truncate(MAX_ENTRIES);
        let mut listing = entries.join("\n");
        if total > MAX_ENTRIES {
            listing.push_str(&format!("\n[{} more entries]", total - MAX_ENTRIES));
        }
        Ok(ToolResult::success(listing))
    }
}
