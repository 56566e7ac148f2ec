//! Builds one LLM client per model slot from configuration

use std::sync::Arc;
use std::time::Duration;

use super::anthropic::{AnthropicClient, AnthropicConfig};
use super::client::{LlmClient, LlmError};
use super::ollama::{OllamaClient, OllamaConfig};
use crate::config::{LlmConfig, ModelSlot, Provider};

pub struct LlmFactory {
    config: LlmConfig,
}

impl LlmFactory {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    /// Client for the supervisor or one of the workers
    pub fn client_for(&self, slot: ModelSlot) -> Result<Arc<dyn LlmClient>, LlmError> {
        let model = self.config.model_for(slot);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        log::debug!(
            "building {:?} client for {} with model {}",
            self.config.provider,
            slot.as_str(),
            model
        );

        let client: Arc<dyn LlmClient> = match self.config.provider {
            Provider::Anthropic => Arc::new(AnthropicClient::new(AnthropicConfig {
                model,
                max_tokens: self.config.max_tokens,
                timeout,
            })?),
            Provider::Ollama => Arc::new(OllamaClient::new(OllamaConfig {
                base_url: self.config.ollama_base_url.clone(),
                model,
                max_tokens: self.config.max_tokens,
                timeout,
            })?),
        };
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentRole;

    #[test]
    fn test_ollama_clients_use_slot_models() {
        let config = LlmConfig {
            provider: Provider::Ollama,
            ..Default::default()
        };
        let factory = LlmFactory::new(config);
        assert_eq!(factory.provider(), Provider::Ollama);

        let supervisor = factory.client_for(ModelSlot::Supervisor).unwrap();
        assert_eq!(supervisor.model(), "llama3.1:8b");

        let developer = factory.client_for(ModelSlot::Worker(AgentRole::Developer)).unwrap();
        assert_eq!(developer.model(), "qwen2.5-coder:7b");
    }

    #[test]
    fn test_model_override_reaches_client() {
        let mut config = LlmConfig {
            provider: Provider::Ollama,
            ..Default::default()
        };
        config.models.docs = Some("phi3:mini".to_string());

        let docs = LlmFactory::new(config)
            .client_for(ModelSlot::Worker(AgentRole::Docs))
            .unwrap();
        assert_eq!(docs.model(), "phi3:mini");
    }
}
