//! LLM client layer
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for provider abstraction, plus a scripted mock
//! - Anthropic and Ollama implementations
//! - A factory that builds one client per model slot

pub mod anthropic;
pub mod client;
pub mod factory;
pub mod ollama;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError, MockLlmClient, estimate_tokens};
pub use factory::LlmFactory;
pub use ollama::{OllamaClient, OllamaConfig};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, ToolCall,
    ToolDefinition, Usage,
};
