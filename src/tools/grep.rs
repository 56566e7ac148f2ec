//! grep tool - Search file contents with regex

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{MAX_OUTPUT_BYTES, Tool, ToolContext, ToolResult, clip_output};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search file contents with regex. Returns matching lines with context."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search (default: repository root)"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob to filter files (e.g., *.py)"
                },
                "context": {
                    "type": "integer",
                    "description": "Lines of context around matches (default: 2)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let pattern = input["pattern"].as_str().ok_or_else(|| eyre!("pattern is required"))?;
        let path = input["path"].as_str().unwrap_or(".");
        let file_pattern = input["file_pattern"].as_str();
        let context_lines = input["context"].as_u64().unwrap_or(2);

        let search_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let mut rg = Command::new("rg");
        rg.arg("--line-number")
            .arg("--no-heading")
            .arg(format!("--context={}", context_lines))
            .arg("--max-count=100");
        if let Some(fp) = file_pattern {
            rg.arg("--glob").arg(fp);
        }
        rg.arg("--").arg(pattern).arg(&search_path);

        match run_search(rg, ctx).await {
            Ok(result) => Ok(result),
            Err(e) => {
                log::debug!("rg unavailable ({}), falling back to grep", e);
                let mut grep = Command::new("grep");
                grep.arg("-rn").arg(format!("-C{}", context_lines)).arg("-E");
                if let Some(fp) = file_pattern {
                    grep.arg("--include").arg(fp);
                }
                grep.arg("--").arg(pattern).arg(&search_path);
                run_search(grep, ctx).await
            }
        }
    }
}

/// Run a search command; exit code 1 means no matches
async fn run_search(mut cmd: Command, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
    cmd.current_dir(&ctx.root).stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = tokio::time::timeout(SEARCH_TIMEOUT, cmd.output())
        .await
        .map_err(|_| eyre!("search timed out after {}s", SEARCH_TIMEOUT.as_secs()))??;

    if output.status.success() || output.status.code() == Some(1) {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.is_empty() {
            Ok(ToolResult::success("No matches found"))
        } else {
            let root = ctx.root.to_string_lossy();
            let relative = stdout.replace(&format!("{}/", root), "");
            Ok(ToolResult::success(clip_output(&relative, MAX_OUTPUT_BYTES)))
        }
    } else {
        Ok(ToolResult::error(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}
