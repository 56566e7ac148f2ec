//! Tool executor - tool registration, per-role subsets and execution

use std::collections::BTreeMap;

use super::{
    EditFileTool, GitAddTool, GitCommitTool, GitDiffTool, GitLogTool, GitStatusTool, GlobTool, GrepTool,
    ListDirectoryTool, ReadFileTool, RepoTreeTool, RunCommandTool, SubmitReportTool, Tool, ToolContext,
    ToolDefinition, ToolError, ToolResult, WriteFileTool,
};
use crate::llm::ToolCall;

/// Manages tool execution for one worker
pub struct ToolExecutor {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    /// Executor with every repository tool
    pub fn standard() -> Self {
        let mut executor = Self::new();

        // File system
        executor.add_tool(Box::new(ReadFileTool));
        executor.add_tool(Box::new(WriteFileTool));
        executor.add_tool(Box::new(EditFileTool));
        executor.add_tool(Box::new(ListDirectoryTool));
        executor.add_tool(Box::new(RepoTreeTool));
        executor.add_tool(Box::new(GlobTool));
        executor.add_tool(Box::new(GrepTool));

        // Commands and version control
        executor.add_tool(Box::new(RunCommandTool));
        executor.add_tool(Box::new(GitStatusTool));
        executor.add_tool(Box::new(GitDiffTool));
        executor.add_tool(Box::new(GitAddTool));
        executor.add_tool(Box::new(GitCommitTool));
        executor.add_tool(Box::new(GitLogTool));

        // Completion signal
        executor.add_tool(Box::new(SubmitReportTool));

        executor
    }

    /// Standard executor restricted to the named tools
    pub fn with_tools(names: &[&str]) -> Self {
        let mut executor = Self::standard();
        executor.tools.retain(|name, _| names.contains(&name.as_str()));
        executor
    }

    /// Create an empty executor (for custom tool sets)
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions for the LLM, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a tool call; failures come back as error results
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        match self.tools.get(&tool_call.name) {
            Some(tool) => match tool.execute(tool_call.input.clone(), ctx).await {
                Ok(result) => result,
                Err(e) => ToolResult::error(format!("Tool error: {}", e)),
            },
            None => ToolResult::error(
                ToolError::UnknownTool {
                    name: tool_call.name.clone(),
                }
                .to_string(),
            ),
        }
    }

    /// Execute calls in order
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let result = self.execute(call, ctx).await;
            results.push((call.id.clone(), result));
        }
        results
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::standard()
    }
}
