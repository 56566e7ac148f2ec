//! Run state - the single record threaded through every step of a run
//!
//! The driver owns the state between steps. The supervisor writes `plan`,
//! `next_agent`, `current_instruction` and appends routing history; workers
//! only ever reach it through the normalizer. Every sequence is append-only.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::{AgentRole, NextAgent};
use super::report::{Artifacts, ReportStatus};

/// One supervisor decision as recorded in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub iteration: u32,
    pub agent: NextAgent,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// One worker invocation as recorded by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: AgentRole,
    pub output: String,
    pub status: ReportStatus,
    pub timestamp: DateTime<Utc>,
    pub iteration: u32,
}

/// Human-readable log line (observability only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub speaker: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Human-in-the-loop decision on a paused dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum HumanApproval {
    #[default]
    Unset,
    Approved,
    Rejected { feedback: String },
}

/// Why a run is (or is not) still going
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Paused { agent: AgentRole },
    Finished,
    CeilingReached,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Paused { .. } => "paused",
            RunStatus::Finished => "finished",
            RunStatus::CeilingReached => "ceiling_reached",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses cannot be resumed
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Finished | RunStatus::CeilingReached)
    }
}

/// Supervisor state-machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    Planning,
    Routing,
    Terminated,
}

/// The next thing the driver has to do for this state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStep {
    Plan,
    Dispatch(AgentRole),
    Route,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub session_id: String,
    pub task: String,
    pub repo_path: PathBuf,
    pub plan: String,
    pub next_agent: Option<NextAgent>,
    pub current_instruction: String,
    pub iteration: u32,
    pub routing_history: Vec<RoutingEntry>,
    pub agent_outputs: Vec<AgentOutput>,
    pub artifacts: Artifacts,
    pub conversation_log: Vec<ConversationEntry>,
    pub human_approval: HumanApproval,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// Fresh state for a task submission: empty accumulators, iteration 0
    pub fn new(session_id: impl Into<String>, task: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            task: task.into(),
            repo_path: repo_path.into(),
            plan: String::new(),
            next_agent: None,
            current_instruction: String::new(),
            iteration: 0,
            routing_history: Vec::new(),
            agent_outputs: Vec::new(),
            artifacts: Artifacts::new(),
            conversation_log: Vec::new(),
            human_approval: HumanApproval::Unset,
            status: RunStatus::Running,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a conversation log line
    pub fn log(&mut self, speaker: impl Into<String>, content: impl Into<String>) {
        self.conversation_log.push(ConversationEntry {
            speaker: speaker.into(),
            content: content.into(),
            timestamp: Utc::now(),
        });
        self.touch();
    }

    pub fn phase(&self, max_iterations: u32) -> SupervisorPhase {
        if self.iteration == 0 || self.plan.is_empty() {
            SupervisorPhase::Planning
        } else if self.next_agent.is_some_and(|n| n.is_terminal()) || self.iteration > max_iterations {
            SupervisorPhase::Terminated
        } else {
            SupervisorPhase::Routing
        }
    }

    /// Derive the pending step from the state alone.
    ///
    /// A worker output tagged with the current iteration means the dispatch for
    /// that iteration already happened and the supervisor has to route next.
    pub fn pending_step(&self, max_iterations: u32) -> PendingStep {
        if self.status.is_terminal() {
            return PendingStep::Done;
        }
        if self.iteration == 0 {
            return PendingStep::Plan;
        }
        match self.next_agent {
            None => PendingStep::Plan,
            Some(NextAgent::Finish) => PendingStep::Done,
            Some(NextAgent::Worker(_)) if self.iteration > max_iterations => PendingStep::Done,
            Some(NextAgent::Worker(role)) => {
                let dispatched = self
                    .agent_outputs
                    .last()
                    .is_some_and(|output| output.iteration == self.iteration);
                if dispatched { PendingStep::Route } else { PendingStep::Dispatch(role) }
            }
        }
    }

    pub fn last_routing(&self) -> Option<&RoutingEntry> {
        self.routing_history.last()
    }

    /// True when the last history entry is the terminal sentinel
    pub fn ended_with_terminal(&self) -> bool {
        self.last_routing().is_some_and(|entry| entry.agent.is_terminal())
    }

    /// `files_changed` artifact as a list of paths
    pub fn changed_files(&self) -> Vec<String> {
        self.artifacts
            .get("files_changed")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }

    /// Whether a developer output that changed code has no QA output after it
    pub fn has_untested_changes(&self) -> bool {
        let last_dev = self
            .agent_outputs
            .iter()
            .rposition(|o| o.agent == AgentRole::Developer && o.status != ReportStatus::Error);
        let last_qa = self.agent_outputs.iter().rposition(|o| o.agent == AgentRole::Qa);

        let code_changed = !self.changed_files().is_empty()
            || self.artifacts.get("code_changed").and_then(|v| v.as_bool()) == Some(true);

        match (last_dev, last_qa) {
            (Some(dev), Some(qa)) => code_changed && dev > qa,
            (Some(_), None) => code_changed,
            _ => false,
        }
    }
}
