//! run_command tool - Execute shell commands in the repository

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{MAX_OUTPUT_BYTES, Tool, ToolContext, ToolResult, clip_output};

pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command in the repository root. Use for test runners, linters and build tools."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Timeout in milliseconds"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let command = input["command"].as_str().ok_or_else(|| eyre!("command is required"))?;
        let timeout = input["timeout_ms"]
            .as_u64()
            .map(Duration::from_millis)
            .unwrap_or(ctx.command_timeout);

        log::debug!("[{}] run_command: {}", ctx.session_id, command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&ctx.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(output) => output?,
            Err(_) => {
                return Ok(ToolResult::error(format!(
                    "Command timed out after {}ms",
                    timeout.as_millis()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let result = if stdout.is_empty() && !stderr.is_empty() {
            stderr.to_string()
        } else if stderr.is_empty() {
            stdout.to_string()
        } else {
            format!("{}\n\nSTDERR:\n{}", stdout, stderr)
        };
        let clipped = clip_output(&result, MAX_OUTPUT_BYTES);

        if output.status.success() {
            Ok(ToolResult::success(clipped))
        } else {
            Ok(ToolResult::error(format!(
                "Exit code: {}\n{}",
                output.status.code().unwrap_or(-1),
                clipped
            )))
        }
    }
}
