//! Worker agents - one tool-using agent per team role
//!
//! Workers never touch the run state. They get an `Assignment`, work in the
//! repository through their role's tools and hand back an `AgentReport`,
//! which the driver folds into the state.

mod developer;
mod devops;
mod docs;
mod profile;
mod qa;
mod reviewer;
mod tool_loop;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use developer::Developer;
pub use devops::Devops;
pub use docs::Docs;
pub use profile::{AgentWorker, RoleProfile, assignment_prompt};
pub use qa::Qa;
pub use reviewer::{Reviewer, Verdict};
pub use tool_loop::{Submission, ToolInvocation, ToolLoop, Transcript};

use crate::config::{ModelSlot, WorkerConfig};
use crate::domain::{AgentReport, AgentRole, RunState};
use crate::llm::{LlmError, LlmFactory};

/// What a worker is asked to do
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub instruction: String,
    pub repo_path: PathBuf,
    pub task: String,
    pub session_id: String,
    /// Files changed earlier in the run, as a hint
    pub changed_files: Vec<String>,
}

impl Assignment {
    /// The dispatch the state currently asks for
    pub fn from_state(state: &RunState) -> Self {
        Self {
            instruction: state.current_instruction.clone(),
            repo_path: state.repo_path.clone(),
            task: state.task.clone(),
            session_id: state.session_id.clone(),
            changed_files: state.changed_files(),
        }
    }
}

/// Errors a worker can raise; the driver turns them into error reports
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Worker setup failed: {0}")]
    Setup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn run(&self, assignment: &Assignment) -> Result<AgentReport, WorkerError>;
}

/// Workers by role
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<AgentRole, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five role workers, each with its own model client
    pub fn standard(factory: &LlmFactory, config: &WorkerConfig, max_tokens: u32) -> Result<Self, LlmError> {
        let client = |role| factory.client_for(ModelSlot::Worker(role));
        let mut registry = Self::new();

        registry.register(Arc::new(
            AgentWorker::new(Developer, client(AgentRole::Developer)?, config.clone()).with_max_tokens(max_tokens),
        ));
        registry.register(Arc::new(
            AgentWorker::new(Qa, client(AgentRole::Qa)?, config.clone()).with_max_tokens(max_tokens),
        ));
        registry.register(Arc::new(
            AgentWorker::new(Reviewer, client(AgentRole::Reviewer)?, config.clone()).with_max_tokens(max_tokens),
        ));
        registry.register(Arc::new(
            AgentWorker::new(Devops, client(AgentRole::Devops)?, config.clone()).with_max_tokens(max_tokens),
        ));
        registry.register(Arc::new(
            AgentWorker::new(Docs, client(AgentRole::Docs)?, config.clone()).with_max_tokens(max_tokens),
        ));
        Ok(registry)
    }

    /// Register a worker under its own role, replacing any previous one
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.role(), worker);
    }

    pub fn with(mut self, worker: Arc<dyn Worker>) -> Self {
        self.register(worker);
        self
    }

    pub fn get(&self, role: AgentRole) -> Option<Arc<dyn Worker>> {
        self.workers.get(&role).cloned()
    }

    /// Registered roles in declaration order
    pub fn roles(&self) -> Vec<AgentRole> {
        self.workers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
