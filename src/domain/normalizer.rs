//! Output normalizer - folds a worker report into the run state
//!
//! Total and pure with respect to its inputs: it never infers status or
//! artifacts, it only records what the worker returned.

use chrono::Utc;

use super::agent::AgentRole;
use super::report::{AgentReport, Artifacts};
use super::state::{AgentOutput, RunState};

/// Record a worker report against the current iteration
pub fn record(state: &mut RunState, agent: AgentRole, report: AgentReport) {
    let AgentReport { text, status, artifacts } = report;

    let entry = format!(
        "{} **{} report:**\n\n{}",
        status.icon(),
        agent.as_str().to_uppercase(),
        text
    );

    state.agent_outputs.push(AgentOutput {
        agent,
        output: text,
        status,
        timestamp: Utc::now(),
        iteration: state.iteration,
    });
    merge_artifacts(&mut state.artifacts, artifacts);
    state.log(agent.as_str(), entry);

    log::debug!(
        "[{}] recorded {} report from {} at iteration {}",
        state.session_id,
        status,
        agent,
        state.iteration
    );
}

/// Shallow merge; later values win on key collision
pub fn merge_artifacts(target: &mut Artifacts, incoming: Artifacts) {
    for (key, value) in incoming {
        target.insert(key, value);
    }
}
