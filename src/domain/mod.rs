//! Domain types for a supervised run
//!
//! - `agent`: worker roles and the routing target domain
//! - `report`: what workers return
//! - `state`: the run state threaded through every step
//! - `normalizer`: folds reports into the state

pub mod agent;
pub mod normalizer;
pub mod report;
pub mod state;

pub use agent::{AgentRole, NextAgent, TERMINAL};
pub use normalizer::{merge_artifacts, record};
pub use report::{AgentReport, Artifacts, ReportStatus};
pub use state::{
    AgentOutput, ConversationEntry, HumanApproval, PendingStep, RoutingEntry, RunState, RunStatus, SupervisorPhase,
};
