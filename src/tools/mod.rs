//! Repository tool surface used by worker agents
//!
//! Every tool is scoped to one repository root through a `ToolContext`.
//! Failures the model can act on come back as error `ToolResult`s; only
//! malformed input surfaces as `Err`, which the executor turns into an error
//! result as well, so a worker's tool loop never aborts on a tool call.

mod context;
mod edit_file;
mod executor;
mod git;
mod glob_tool;
mod grep;
mod list_directory;
mod read_file;
mod repo_tree;
mod run_command;
mod submit_report;
mod write_file;

pub use context::{ToolContext, ToolError};
pub use executor::ToolExecutor;

use async_trait::async_trait;
use serde_json::Value;

pub use crate::llm::ToolDefinition;

/// Largest tool output handed back to the model
pub const MAX_OUTPUT_BYTES: usize = 30_000;

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches LLM tool_use name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult, eyre::Error>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Result from tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Cut long output at a char boundary and note the original size
pub fn clip_output(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...\n[truncated, {} bytes total]", &text[..end], text.len())
}

pub use edit_file::EditFileTool;
pub use git::{GitAddTool, GitCommitTool, GitDiffTool, GitLogTool, GitStatusTool};
pub use glob_tool::GlobTool;
pub use grep::GrepTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use repo_tree::{RepoTreeTool, summarize_repo};
pub use run_command::RunCommandTool;
pub use submit_report::{SUBMIT_REPORT, SubmitReportTool};
pub use write_file::WriteFileTool;
