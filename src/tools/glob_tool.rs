//! glob tool - Find files matching a glob pattern

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolResult};

const MAX_MATCHES: usize = 1000;

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        "Find files matching a glob pattern (e.g., **/*.py)"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match"
                },
                "path": {
                    "type": "string",
                    "description": "Base directory (default: repository root)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let pattern = input["pattern"].as_str().ok_or_else(|| eyre!("pattern is required"))?;
        let base = input["path"].as_str().unwrap_or(".");

        let root = ctx.validate_path(Path::new("."))?;
        let base_path = match ctx.validate_path(Path::new(base)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };
        let full_pattern = base_path.join(pattern);

        let paths = match glob::glob(full_pattern.to_str().unwrap_or("")) {
            Ok(paths) => paths,
            Err(e) => return Ok(ToolResult::error(format!("Invalid pattern '{}': {}", pattern, e))),
        };

        let matches: Vec<_> = paths
            .filter_map(|r| r.ok())
            .filter(|p| p.starts_with(&root))
            .map(|p| p.strip_prefix(&root).unwrap_or(&p).to_string_lossy().to_string())
            .take(MAX_MATCHES)
            .collect();

        if matches.is_empty() {
            Ok(ToolResult::success("No matches found"))
        } else {
            Ok(ToolResult::success(matches.join("\n")))
        }
    }
}
