//! repo_tree tool - Bounded directory tree of the repository
//!
//! The same rendering feeds the supervisor's planning prompt.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolContext, ToolResult};

/// Directories that never help a plan
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "__pycache__", "venv", "dist", "build"];

const DEFAULT_DEPTH: usize = 2;
const DEFAULT_MAX_ENTRIES: usize = 200;

/// Indented tree of `root`, at most `max_depth` levels and `max_entries` lines
pub fn summarize_repo(root: &Path, max_depth: usize, max_entries: usize) -> String {
    let mut lines = Vec::new();
    let mut truncated = false;
    walk(root, 0, max_depth, max_entries, &mut lines, &mut truncated);

    if lines.is_empty() {
        return "(empty repository)".to_string();
    }
    if truncated {
        lines.push(format!("... (listing capped at {} entries)", max_entries));
    }
    lines.join("\n")
}

fn walk(dir: &Path, depth: usize, max_depth: usize, max_entries: usize, lines: &mut Vec<String>, truncated: &mut bool) {
    let Ok(read) = fs::read_dir(dir) else {
        return;
    };

    let mut entries: Vec<_> = read
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&&*name)
        })
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if lines.len() >= max_entries {
            *truncated = true;
            return;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().to_string();
        let indent = "  ".repeat(depth);
        if is_dir {
            lines.push(format!("{}{}/", indent, name));
            if depth + 1 < max_depth {
                walk(&entry.path(), depth + 1, max_depth, max_entries, lines, truncated);
            }
        } else {
            lines.push(format!("{}{}", indent, name));
        }
    }
}

pub struct RepoTreeTool;

#[async_trait]
impl Tool for RepoTreeTool {
    fn name(&self) -> &'static str {
        "repo_tree"
    }

    fn description(&self) -> &'static str {
        "Show the directory tree of the repository (hidden and build directories skipped)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Subdirectory to start from (default: repository root)"
                },
                "depth": {
                    "type": "integer",
                    "description": "Levels to descend (default: 2, max: 6)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let path = input["path"].as_str().unwrap_or(".");
        let depth = input["depth"].as_u64().map(|d| d.clamp(1, 6) as usize).unwrap_or(DEFAULT_DEPTH);

        let start = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };
        if !start.is_dir() {
            return Ok(ToolResult::error(format!("Not a directory: {}", path)));
        }

        let tree = tokio::task::spawn_blocking(move || summarize_repo(&start, depth, DEFAULT_MAX_ENTRIES)).await?;
        Ok(ToolResult::success(tree))
    }
}
