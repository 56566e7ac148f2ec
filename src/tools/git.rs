//! Version-control tools - status, diff, add, commit and log via the git CLI

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use tokio::process::Command;

use super::{MAX_OUTPUT_BYTES, Tool, ToolContext, ToolResult, clip_output};

/// Run git in the repository root; a non-zero exit becomes an error result
async fn git(ctx: &ToolContext, args: &[&str]) -> Result<ToolResult, eyre::Error> {
    log::debug!("[{}] git {}", ctx.session_id, args.join(" "));

    let output = Command::new("git")
        .args(args)
        .current_dir(&ctx.root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(ctx.command_timeout, output).await {
        Ok(output) => output.map_err(|e| eyre!("Failed to execute git: {}", e))?,
        Err(_) => return Ok(ToolResult::error(format!("git {} timed out", args[0]))),
    };

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(ToolResult::success(clip_output(stdout.trim_end(), MAX_OUTPUT_BYTES)))
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        Ok(ToolResult::error(format!("git {} failed: {}", args[0], detail.trim())))
    }
}

/// Paths from the input, each checked against the sandbox
fn sandboxed_paths(input: &Value, ctx: &ToolContext) -> Result<Vec<String>, ToolResult> {
    let raw: Vec<String> = match &input["paths"] {
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        Value::String(single) => vec![single.clone()],
        _ => Vec::new(),
    };

    let mut paths = Vec::with_capacity(raw.len());
    for path in raw {
        let full = ctx
            .validate_path(Path::new(&path))
            .map_err(|e| ToolResult::error(e.to_string()))?;
        paths.push(full.to_string_lossy().to_string());
    }
    Ok(paths)
}

pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &'static str {
        "git_status"
    }

    fn description(&self) -> &'static str {
        "Show the working tree status (branch plus modified, staged and untracked files)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let result = git(ctx, &["status", "--porcelain=v1", "--branch"]).await?;
        if !result.is_error && result.content.lines().count() <= 1 {
            return Ok(ToolResult::success(format!("{}\nWorking tree clean", result.content)));
        }
        Ok(result)
    }
}

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &'static str {
        "git_diff"
    }

    fn description(&self) -> &'static str {
        "Show uncommitted changes, optionally for one path or only staged changes."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Limit the diff to this path"
                },
                "staged": {
                    "type": "boolean",
                    "description": "Show staged changes instead of unstaged ones"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let path = match input["path"].as_str() {
            Some(p) => match ctx.validate_path(Path::new(p)) {
                Ok(full) => Some(full.to_string_lossy().to_string()),
                Err(e) => return Ok(ToolResult::error(e.to_string())),
            },
            None => None,
        };

        let mut args = vec!["diff"];
        if input["staged"].as_bool().unwrap_or(false) {
            args.push("--cached");
        }
        if let Some(p) = &path {
            args.push("--");
            args.push(p);
        }

        let result = git(ctx, &args).await?;
        if !result.is_error && result.content.is_empty() {
            return Ok(ToolResult::success("No changes"));
        }
        Ok(result)
    }
}

pub struct GitAddTool;

#[async_trait]
impl Tool for GitAddTool {
    fn name(&self) -> &'static str {
        "git_add"
    }

    fn description(&self) -> &'static str {
        "Stage files for commit. Pass the paths to stage, or omit them to stage everything."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Paths relative to the repository root"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let paths = match sandboxed_paths(&input, ctx) {
            Ok(paths) => paths,
            Err(refused) => return Ok(refused),
        };

        let mut args = vec!["add"];
        if paths.is_empty() {
            args.push("-A");
        } else {
            args.push("--");
            args.extend(paths.iter().map(String::as_str));
        }

        let result = git(ctx, &args).await?;
        if result.is_error {
            return Ok(result);
        }
        let staged = if paths.is_empty() { "all changes".to_string() } else { format!("{} path(s)", paths.len()) };
        Ok(ToolResult::success(format!("Staged {}", staged)))
    }
}

pub struct GitCommitTool;

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &'static str {
        "git_commit"
    }

    fn description(&self) -> &'static str {
        "Commit staged changes with a message. Returns the new commit hash."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let message = input["message"].as_str().ok_or_else(|| eyre!("message is required"))?;
        if message.trim().is_empty() {
            return Ok(ToolResult::error("Commit message must not be empty"));
        }

        let result = git(ctx, &["commit", "-m", message]).await?;
        if result.is_error {
            return Ok(result);
        }

        let head = git(ctx, &["rev-parse", "--short", "HEAD"]).await?;
        Ok(ToolResult::success(format!("Committed {}: {}", head.content.trim(), message)))
    }
}

pub struct GitLogTool;

#[async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &'static str {
        "git_log"
    }

    fn description(&self) -> &'static str {
        "Show recent commits, one line each."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Number of commits (default: 10)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let limit = input["limit"].as_u64().unwrap_or(10).clamp(1, 100).to_string();
        git(ctx, &["log", "--oneline", "-n", limit.as_str()]).await
    }
}
