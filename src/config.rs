//! Configuration loading
//!
//! YAML file with every section defaulted, then `ITDEPT_*` environment
//! overrides on top.

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::AgentRole;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub supervisor: SupervisorConfig,
    pub workers: WorkerConfig,
    pub hitl: HitlConfig,
    pub storage: StorageConfig,
    /// Repository used when the CLI is given none
    pub repo_path: Option<PathBuf>,
}

/// Which backend serves completions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    Ollama,
}

impl FromStr for Provider {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "ollama" => Ok(Provider::Ollama),
            other => Err(eyre!("unknown LLM provider: {}", other)),
        }
    }
}

/// Who a model is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSlot {
    Supervisor,
    Worker(AgentRole),
}

impl ModelSlot {
    pub fn all() -> Vec<ModelSlot> {
        std::iter::once(ModelSlot::Supervisor)
            .chain(AgentRole::ALL.into_iter().map(ModelSlot::Worker))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSlot::Supervisor => "supervisor",
            ModelSlot::Worker(role) => role.as_str(),
        }
    }

    fn env_var(&self) -> String {
        format!("ITDEPT_{}_MODEL", self.as_str().to_uppercase())
    }
}

/// Per-slot model overrides; unset slots use the provider default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub supervisor: Option<String>,
    pub developer: Option<String>,
    pub qa: Option<String>,
    pub reviewer: Option<String>,
    pub devops: Option<String>,
    pub docs: Option<String>,
}

impl ModelsConfig {
    fn slot(&self, slot: ModelSlot) -> Option<&String> {
        match slot {
            ModelSlot::Supervisor => self.supervisor.as_ref(),
            ModelSlot::Worker(AgentRole::Developer) => self.developer.as_ref(),
            ModelSlot::Worker(AgentRole::Qa) => self.qa.as_ref(),
            ModelSlot::Worker(AgentRole::Reviewer) => self.reviewer.as_ref(),
            ModelSlot::Worker(AgentRole::Devops) => self.devops.as_ref(),
            ModelSlot::Worker(AgentRole::Docs) => self.docs.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: ModelSlot) -> &mut Option<String> {
        match slot {
            ModelSlot::Supervisor => &mut self.supervisor,
            ModelSlot::Worker(AgentRole::Developer) => &mut self.developer,
            ModelSlot::Worker(AgentRole::Qa) => &mut self.qa,
            ModelSlot::Worker(AgentRole::Reviewer) => &mut self.reviewer,
            ModelSlot::Worker(AgentRole::Devops) => &mut self.devops,
            ModelSlot::Worker(AgentRole::Docs) => &mut self.docs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub ollama_base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub models: ModelsConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            ollama_base_url: crate::llm::ollama::DEFAULT_BASE_URL.to_string(),
            max_tokens: 8192,
            timeout_ms: 300000,
            models: ModelsConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Resolved model name for a slot
    pub fn model_for(&self, slot: ModelSlot) -> String {
        if let Some(model) = self.models.slot(slot) {
            return model.clone();
        }
        let default = match (self.provider, slot) {
            (Provider::Anthropic, ModelSlot::Supervisor) => "claude-opus-4-5",
            (Provider::Anthropic, ModelSlot::Worker(_)) => "claude-sonnet-4-5",
            (Provider::Ollama, ModelSlot::Worker(AgentRole::Developer | AgentRole::Qa)) => "qwen2.5-coder:7b",
            (Provider::Ollama, _) => "llama3.1:8b",
        };
        default.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Routing ceiling; the run is forced to stop when it is reached
    pub max_iterations: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Most recent agent outputs shown to the router
    pub output_window: usize,
    pub output_chars: usize,
    /// Most recent routing entries shown to the router
    pub history_window: usize,
    pub history_chars: usize,
    /// Artifacts shown to the router, well-known keys first
    pub artifact_window: usize,
    pub artifact_chars: usize,
    /// Where a run starts when the plan names no usable agent
    pub default_agent: AgentRole,
    /// Re-route a finish to QA while code changes are untested
    pub require_qa_after_changes: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 12,
            temperature: 0.0,
            max_tokens: 1024,
            output_window: 6,
            output_chars: 800,
            history_window: 8,
            history_chars: 80,
            artifact_window: 20,
            artifact_chars: 100,
            default_agent: AgentRole::Developer,
            require_qa_after_changes: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Tool-use turns per worker invocation
    pub max_steps: u32,
    pub temperature: f32,
    pub command_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            temperature: 0.0,
            command_timeout_ms: 120000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HitlConfig {
    /// Agents the driver pauses before when HITL is on
    pub interrupt_before: Vec<AgentRole>,
}

impl Default for HitlConfig {
    fn default() -> Self {
        Self {
            interrupt_before: vec![AgentRole::Developer],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("itdept"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply `ITDEPT_*` overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("ITDEPT_LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(url) = lookup("ITDEPT_OLLAMA_BASE_URL") {
            self.llm.ollama_base_url = url;
        }
        if let Some(max) = lookup("ITDEPT_MAX_ITERATIONS") {
            self.supervisor.max_iterations = max
                .trim()
                .parse()
                .with_context(|| format!("ITDEPT_MAX_ITERATIONS is not a number: {}", max))?;
        }
        if let Some(repo) = lookup("ITDEPT_REPO_PATH") {
            self.repo_path = Some(PathBuf::from(repo));
        }
        for slot in ModelSlot::all() {
            if let Some(model) = lookup(&slot.env_var()) {
                *self.llm.models.slot_mut(slot) = Some(model);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.supervisor.max_iterations == 0 {
            return Err(eyre!("supervisor.max_iterations must be at least 1"));
        }
        if self.workers.max_steps == 0 {
            return Err(eyre!("workers.max_steps must be at least 1"));
        }
        Ok(())
    }
}
