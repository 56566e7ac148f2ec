//! Bounded tool-use conversation shared by every worker
//!
//! The model is called with the role's tool definitions; each tool call is
//! executed against the repository and its result fed back as the next user
//! turn. The loop ends when the model stops asking for tools, when it submits
//! its report, or when the step budget is spent.

use serde_json::Value;

use crate::domain::{Artifacts, ReportStatus};
use crate::llm::{CompletionRequest, ContentBlock, LlmClient, LlmError, Message, StopReason, Usage};
use crate::tools::{SUBMIT_REPORT, ToolContext, ToolExecutor};

/// One executed tool call
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub input: Value,
    pub content: String,
    pub is_error: bool,
}

/// Arguments of an accepted `submit_report` call
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub summary: String,
    pub status: ReportStatus,
    pub artifacts: Artifacts,
}

impl Submission {
    fn from_input(input: &Value) -> Self {
        let summary = input["summary"].as_str().unwrap_or_default().trim().to_string();
        let status = input["status"]
            .as_str()
            .and_then(ReportStatus::from_label)
            .unwrap_or(ReportStatus::Success);
        let artifacts = input["artifacts"]
            .as_object()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Self {
            summary,
            status,
            artifacts,
        }
    }
}

/// Everything a worker saw while running its tool loop
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Last non-empty text the model produced
    pub final_text: String,
    pub submitted: Option<Submission>,
    pub invocations: Vec<ToolInvocation>,
    /// Model calls made
    pub steps: u32,
    pub hit_step_limit: bool,
    pub usage: Usage,
}

impl Transcript {
    /// Invocations of one tool, oldest first
    pub fn calls_to<'a>(&'a self, name: &'a str) -> impl DoubleEndedIterator<Item = &'a ToolInvocation> + 'a {
        self.invocations.iter().filter(move |inv| inv.name == name)
    }

    pub fn error_count(&self) -> usize {
        self.invocations.iter().filter(|inv| inv.is_error).count()
    }

    /// Status for a worker that never submitted one.
    ///
    /// An exhausted budget is an error; a final tool call that failed leaves
    /// the work in doubt.
    pub fn inferred_status(&self) -> ReportStatus {
        if self.hit_step_limit {
            return ReportStatus::Error;
        }
        match self.invocations.last() {
            Some(last) if last.is_error => ReportStatus::Warning,
            _ => ReportStatus::Success,
        }
    }
}

pub struct ToolLoop<'a> {
    llm: &'a dyn LlmClient,
    executor: &'a ToolExecutor,
    max_steps: u32,
    temperature: f32,
    max_tokens: u32,
}

impl<'a> ToolLoop<'a> {
    pub fn new(llm: &'a dyn LlmClient, executor: &'a ToolExecutor, max_steps: u32) -> Self {
        Self {
            llm,
            executor,
            max_steps: max_steps.max(1),
            temperature: 0.0,
            max_tokens: 8192,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Run the conversation; only a failed model call is an error
    pub async fn run(&self, system: &str, user: &str, ctx: &ToolContext) -> Result<Transcript, LlmError> {
        let definitions = self.executor.definitions();
        let mut messages = vec![Message::user(user)];
        let mut transcript = Transcript::default();

        loop {
            if transcript.steps >= self.max_steps {
                log::warn!(
                    "[{}] tool loop stopped after {} steps without a report",
                    ctx.session_id,
                    transcript.steps
                );
                transcript.hit_step_limit = true;
                break;
            }
            transcript.steps += 1;

            let request = CompletionRequest::new(system)
                .with_messages(messages.clone())
                .with_tools(definitions.clone())
                .with_temperature(self.temperature)
                .with_max_tokens(self.max_tokens);
            let response = self.llm.complete(request).await?;
            transcript.usage.add(&response.usage);

            if !response.content.trim().is_empty() {
                transcript.final_text = response.content.trim().to_string();
            }

            if response.tool_calls.is_empty() {
                break;
            }

            messages.push(Message::assistant_tool_turn(&response.content, &response.tool_calls));

            let mut result_blocks = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let result = self.executor.execute(call, ctx).await;
                log::debug!(
                    "[{}] step {} {} -> {}",
                    ctx.session_id,
                    transcript.steps,
                    call.name,
                    if result.is_error { "error" } else { "ok" }
                );

                if call.name == SUBMIT_REPORT && !result.is_error && transcript.submitted.is_none() {
                    transcript.submitted = Some(Submission::from_input(&call.input));
                }

                transcript.invocations.push(ToolInvocation {
                    name: call.name.clone(),
                    input: call.input.clone(),
                    content: result.content.clone(),
                    is_error: result.is_error,
                });
                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: result.content,
                    is_error: result.is_error,
                });
            }
            messages.push(Message::tool_results(result_blocks));

            if transcript.submitted.is_some() || response.stop_reason == StopReason::EndTurn {
                break;
            }
        }

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, MockLlmClient, ToolCall};
    use serde_json::json;
    use tempfile::tempdir;

    fn call(id: &str, name: &str, input: Value) -> CompletionResponse {
        CompletionResponse::with_tool_calls("", vec![ToolCall::new(id, name, input)])
    }

    #[tokio::test]
    async fn test_stops_on_submit_report() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "s1");
        let executor = ToolExecutor::standard();
        let llm = MockLlmClient::new();
        llm.push_response(call("c1", "write_file", json!({"path": "a.txt", "content": "hi"})));
        llm.push_response(call(
            "c2",
            SUBMIT_REPORT,
            json!({"summary": "wrote a.txt", "status": "success", "artifacts": {"note": 1}}),
        ));
        llm.push_text("never reached");

        let transcript = ToolLoop::new(&llm, &executor, 10).run("sys", "go", &ctx).await.unwrap();

        assert_eq!(transcript.steps, 2);
        assert_eq!(llm.remaining(), 1);
        let submitted = transcript.submitted.unwrap();
        assert_eq!(submitted.summary, "wrote a.txt");
        assert_eq!(submitted.status, ReportStatus::Success);
        assert_eq!(submitted.artifacts["note"], json!(1));
        assert!(dir.path().join("a.txt").exists());

        // The second request carries the first tool result back to the model
        let requests = llm.requests();
        assert_eq!(requests[1].messages.len(), 3);
        assert!(!requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_plain_text_ends_the_loop() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "s1");
        let executor = ToolExecutor::standard();
        let llm = MockLlmClient::with_texts(["Nothing to do here."]);

        let transcript = ToolLoop::new(&llm, &executor, 10).run("sys", "go", &ctx).await.unwrap();

        assert_eq!(transcript.steps, 1);
        assert!(transcript.submitted.is_none());
        assert_eq!(transcript.final_text, "Nothing to do here.");
        assert_eq!(transcript.inferred_status(), ReportStatus::Success);
    }

    #[tokio::test]
    async fn test_step_budget() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "s1");
        let executor = ToolExecutor::standard();
        let llm = MockLlmClient::new();
        for i in 0..5 {
            llm.push_response(call(&format!("c{}", i), "list_directory", json!({})));
        }

        let transcript = ToolLoop::new(&llm, &executor, 3).run("sys", "go", &ctx).await.unwrap();

        assert_eq!(transcript.steps, 3);
        assert!(transcript.hit_step_limit);
        assert_eq!(transcript.invocations.len(), 3);
        assert_eq!(transcript.inferred_status(), ReportStatus::Error);
    }

    #[tokio::test]
    async fn test_invalid_submission_keeps_going() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "s1");
        let executor = ToolExecutor::standard();
        let llm = MockLlmClient::new();
        llm.push_response(call("c1", SUBMIT_REPORT, json!({"summary": "x", "status": "meh"})));
        llm.push_response(call("c2", "read_file", json!({"path": "missing.txt"})));
        llm.push_text("gave up");

        let transcript = ToolLoop::new(&llm, &executor, 10).run("sys", "go", &ctx).await.unwrap();

        assert!(transcript.submitted.is_none());
        assert_eq!(transcript.error_count(), 2);
        assert_eq!(transcript.calls_to("read_file").count(), 1);
        assert_eq!(transcript.inferred_status(), ReportStatus::Warning);
    }

    #[tokio::test]
    async fn test_model_failure_is_an_error() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "s1");
        let executor = ToolExecutor::standard();
        let llm = MockLlmClient::new();
        llm.push_error("overloaded");

        let result = ToolLoop::new(&llm, &executor, 10).run("sys", "go", &ctx).await;
        assert!(matches!(result, Err(LlmError::ApiError { status: 503, .. })));
    }
}
