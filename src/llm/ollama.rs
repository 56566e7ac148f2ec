//! Ollama client implementation
//!
//! Talks to a local Ollama server through `/api/chat` with streaming disabled.
//! Tool calls are mapped between the content-block conversation used by the
//! rest of the crate and Ollama's function-call message format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{LlmClient, LlmError};
use super::types::{CompletionRequest, CompletionResponse, ContentBlock, MessageContent, Role, StopReason, ToolCall, Usage};

/// Default Ollama endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "llama3.1:8b".to_string(),
            max_tokens: 4096,
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model).clone();

        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }

        for message in &request.messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            match &message.content {
                MessageContent::Text(text) => messages.push(json!({"role": role, "content": text})),
                MessageContent::Blocks(blocks) => {
                    let mut text = String::new();
                    let mut calls = Vec::new();
                    for block in blocks {
                        match block {
                            ContentBlock::Text { text: t } => text.push_str(t),
                            ContentBlock::ToolUse { name, input, .. } => calls.push(json!({
                                "function": {"name": name, "arguments": input}
                            })),
                            ContentBlock::ToolResult { content, is_error, .. } => {
                                let content = if *is_error {
                                    format!("ERROR: {}", content)
                                } else {
                                    content.clone()
                                };
                                messages.push(json!({"role": "tool", "content": content}));
                            }
                        }
                    }
                    if !text.is_empty() || !calls.is_empty() {
                        let mut msg = json!({"role": role, "content": text});
                        if !calls.is_empty() {
                            msg["tool_calls"] = json!(calls);
                        }
                        messages.push(msg);
                    }
                }
            }
        }

        let mut options = json!({
            "num_predict": request.max_tokens.unwrap_or(self.config.max_tokens)
        });
        if let Some(temperature) = request.temperature {
            options["temperature"] = json!(temperature);
        }

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": options
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(|t| t.to_function_schema()).collect();
            body["tools"] = json!(tools);
        }

        body
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let message = body
            .get("message")
            .ok_or_else(|| LlmError::InvalidResponse(format!("missing message in response: {}", body)))?;

        let content = message["content"].as_str().unwrap_or("").to_string();

        let tool_calls: Vec<ToolCall> = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .enumerate()
                    .map(|(i, call)| {
                        let function = &call["function"];
                        let arguments = match &function["arguments"] {
                            // Some models return arguments as an encoded string
                            Value::String(raw) => serde_json::from_str(raw).unwrap_or(json!({})),
                            Value::Null => json!({}),
                            other => other.clone(),
                        };
                        ToolCall::new(
                            format!("ollama_call_{}", i),
                            function["name"].as_str().unwrap_or(""),
                            arguments,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let stop_reason = if !tool_calls.is_empty() {
            StopReason::ToolUse
        } else if body["done_reason"].as_str() == Some("length") {
            StopReason::MaxTokens
        } else {
            StopReason::EndTurn
        };

        let usage = Usage::new(
            body["prompt_eval_count"].as_u64().unwrap_or(0),
            body["eval_count"].as_u64().unwrap_or(0),
        );

        Ok(CompletionResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        log::debug!("ollama request: model={} url={}", body["model"], self.chat_url());

        let response = self.client.post(self.chat_url()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        self.parse_response(body)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{Message, ToolDefinition};

    fn client() -> OllamaClient {
        OllamaClient::new(OllamaConfig::default()).unwrap()
    }

    #[test]
    fn test_chat_url_trims_slash() {
        let client = OllamaClient::new(OllamaConfig {
            base_url: "http://gpu-box:11434/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.chat_url(), "http://gpu-box:11434/api/chat");
    }

    #[test]
    fn test_build_request_text() {
        let request = CompletionRequest::new("You route work")
            .with_user_message("Task: add tests")
            .with_temperature(0.0)
            .with_max_tokens(1024);

        let body = client().build_request(&request);
        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Task: add tests");
        assert_eq!(body["options"]["num_predict"], 1024);
        assert_eq!(body["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_build_request_maps_tool_turns() {
        let calls = vec![ToolCall::new("t1", "read_file", json!({"path": "a.py"}))];
        let request = CompletionRequest::new("")
            .with_user_message("read a.py")
            .with_message(Message::assistant_tool_turn("", &calls))
            .with_message(Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "t1".to_string(),
                content: "print('hi')".to_string(),
                is_error: false,
            }]))
            .with_tools(vec![ToolDefinition::new("read_file", "Read", json!({"type": "object"}))]);

        let body = client().build_request(&request);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "read_file");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["content"], "print('hi')");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let response = client()
            .parse_response(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"function": {"name": "git_status", "arguments": {}}},
                        {"function": {"name": "read_file", "arguments": "{\"path\": \"x.py\"}"}}
                    ]
                },
                "done_reason": "stop",
                "prompt_eval_count": 12,
                "eval_count": 4
            }))
            .unwrap();

        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[1].input["path"], "x.py");
        assert_eq!(response.tool_calls[1].id, "ollama_call_1");
        assert_eq!(response.usage.total(), 16);
    }

    #[test]
    fn test_parse_response_length_limit() {
        let response = client()
            .parse_response(json!({
                "message": {"role": "assistant", "content": "partial"},
                "done_reason": "length"
            }))
            .unwrap();
        assert_eq!(response.content, "partial");
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
    }

    #[test]
    fn test_parse_response_missing_message() {
        assert!(client().parse_response(json!({"error": "model not found"})).is_err());
    }
}
