//! Supervisor state machine
//!
//! Planning happens once per run and moves the state from iteration 0 to 1.
//! Every routing call appends one history entry, advances the iteration and
//! either names the next worker or terminates the run. Model output never
//! reaches the state without passing through the parser, the iteration
//! ceiling and the QA gate.

use std::sync::Arc;

use chrono::Utc;

use crate::config::SupervisorConfig;
use crate::domain::{AgentRole, HumanApproval, NextAgent, RoutingEntry, RunState, RunStatus};
use crate::llm::LlmClient;

use super::parser::{Decision, PlanRecord, fallback_role, parse_decision, parse_plan};
use super::prompts;

/// Reason recorded on the planning entry of the routing history
pub const PLAN_REASON: &str = "initial plan";

pub struct Supervisor {
    llm: Arc<dyn LlmClient>,
    config: SupervisorConfig,
    valid_agents: Vec<AgentRole>,
}

impl Supervisor {
    pub fn new(llm: Arc<dyn LlmClient>, config: SupervisorConfig, valid_agents: Vec<AgentRole>) -> Self {
        Self {
            llm,
            config,
            valid_agents,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.config.max_iterations
    }

    pub fn valid_agents(&self) -> &[AgentRole] {
        &self.valid_agents
    }

    /// Build the execution plan and pick the starting worker.
    ///
    /// A failed completion or an unreadable response falls back to a
    /// single-step plan handed to the default worker.
    pub async fn plan(&self, state: &mut RunState, repo_summary: &str) -> PlanRecord {
        let system = prompts::system_prompt(&self.valid_agents);
        let user = prompts::planning_prompt(&state.task, &state.repo_path, repo_summary, &self.valid_agents);

        log::info!("Planning session {}", state.session_id);

        let parsed = match self
            .llm
            .complete_text(&system, &user, self.config.temperature, self.config.max_tokens)
            .await
        {
            Ok(raw) => {
                let record = parse_plan(&raw, &self.valid_agents, self.config.default_agent);
                if record.is_none() {
                    log::warn!("Planning response for {} was unparseable, using fallback plan", state.session_id);
                }
                record
            }
            Err(e) => {
                log::warn!("Planning completion failed for {}: {}", state.session_id, e);
                None
            }
        };

        let mut record = parsed.unwrap_or_else(|| self.fallback_plan(&state.task));
        if record.plan.trim().is_empty() {
            record.plan = format!("1. Execute task: {}", state.task);
        }
        if record.first_instruction.trim().is_empty() {
            record.first_instruction = state.task.clone();
        }

        state.plan = record.plan.clone();
        state.next_agent = Some(NextAgent::Worker(record.first_agent));
        state.current_instruction = record.first_instruction.clone();
        state.routing_history.push(RoutingEntry {
            iteration: 0,
            agent: NextAgent::Worker(record.first_agent),
            reason: PLAN_REASON.to_string(),
            timestamp: Utc::now(),
        });
        state.iteration = 1;

        let mut entry = format!("📋 **Execution plan**\n\n{}\n\n", record.plan);
        if !record.complexity.is_empty() {
            entry.push_str(&format!("Complexity: {}\n", record.complexity));
        }
        if let Some(steps) = record.estimated_steps {
            entry.push_str(&format!("Estimated steps: {}\n", steps));
        }
        entry.push_str(&format!(
            "Starting with **{}**: {}",
            record.first_agent.as_str().to_uppercase(),
            record.first_instruction
        ));
        state.log("supervisor", entry);

        log::info!(
            "Session {} planned, starting with {}",
            state.session_id,
            record.first_agent
        );
        record
    }

    /// Decide what happens after the latest worker report
    pub async fn route(&self, state: &mut RunState) -> Decision {
        let iteration = state.iteration;
        let ceiling = self.config.max_iterations;

        let system = prompts::system_prompt(&self.valid_agents);
        let user = prompts::routing_prompt(state, &self.config, &self.valid_agents);

        let mut decision = match self
            .llm
            .complete_text(&system, &user, self.config.temperature, self.config.max_tokens)
            .await
        {
            Ok(raw) => {
                let decision = parse_decision(&raw, &self.valid_agents);
                if !decision.parsed {
                    log::warn!(
                        "Routing response for {} at iteration {} was unparseable",
                        state.session_id,
                        iteration
                    );
                }
                decision
            }
            Err(e) => {
                log::warn!("Routing completion failed for {}: {}", state.session_id, e);
                Decision::terminal(format!("supervisor completion failed: {}", e))
            }
        };

        let at_ceiling = iteration >= ceiling;
        if at_ceiling {
            if !decision.next_agent.is_terminal() {
                log::warn!(
                    "Session {} hit the iteration limit, overriding {} with FINISH",
                    state.session_id,
                    decision.next_agent
                );
            }
            decision.next_agent = NextAgent::Finish;
            decision.instruction.clear();
            decision.reason = format!("Iteration limit reached ({}/{}): forcing FINISH", iteration, ceiling);
        } else if self.needs_qa(state, &decision) {
            let files = state.changed_files();
            let scope = if files.is_empty() {
                "the latest code changes".to_string()
            } else {
                files.join(", ")
            };
            log::info!("Session {} tried to finish with untested changes, routing to qa", state.session_id);
            decision.next_agent = NextAgent::Worker(AgentRole::Qa);
            decision.instruction = format!(
                "Run the test suite and verify the changes to {}. Report every failing test with its error output.",
                scope
            );
            decision.reason = "code changes have not been verified by qa".to_string();
        }

        if let HumanApproval::Rejected { feedback } = &state.human_approval {
            // The rejected instruction must not come back unchanged
            if !decision.next_agent.is_terminal()
                && decision.instruction.trim() == state.current_instruction.trim()
            {
                decision.instruction = format!("{}\n\nHuman feedback: {}", decision.instruction.trim(), feedback);
            }
        }

        if !decision.next_agent.is_terminal() && decision.instruction.trim().is_empty() {
            decision.instruction = format!("Continue with the task: {}", state.task);
        }

        self.apply(state, &decision, at_ceiling);
        decision
    }

    fn needs_qa(&self, state: &RunState, decision: &Decision) -> bool {
        decision.parsed
            && decision.next_agent.is_terminal()
            && self.config.require_qa_after_changes
            && self.valid_agents.contains(&AgentRole::Qa)
            && state.has_untested_changes()
    }

    fn apply(&self, state: &mut RunState, decision: &Decision, at_ceiling: bool) {
        let iteration = state.iteration;

        state.routing_history.push(RoutingEntry {
            iteration,
            agent: decision.next_agent,
            reason: decision.reason.clone(),
            timestamp: Utc::now(),
        });
        state.iteration = iteration + 1;
        state.next_agent = Some(decision.next_agent);
        state.current_instruction = decision.instruction.clone();
        state.human_approval = HumanApproval::Unset;

        if let Some(update) = &decision.plan_update {
            log::debug!("Session {} plan updated at iteration {}", state.session_id, iteration);
            state.plan = update.clone();
        }

        let entry = match decision.next_agent {
            NextAgent::Finish => {
                state.status = if at_ceiling {
                    RunStatus::CeilingReached
                } else {
                    RunStatus::Finished
                };
                format!("🏁 **Supervisor: FINISH** (iteration {})\n\n{}", iteration, decision.reason)
            }
            NextAgent::Worker(role) => format!(
                "🎯 **Supervisor → {}** (iteration {})\n\n{}\n\nReason: {}",
                role.as_str().to_uppercase(),
                iteration,
                decision.instruction,
                decision.reason
            ),
        };
        state.log("supervisor", entry);

        log::info!(
            "Session {} iteration {} routed to {}: {}",
            state.session_id,
            iteration,
            decision.next_agent,
            decision.reason
        );
    }

    fn fallback_plan(&self, task: &str) -> PlanRecord {
        PlanRecord {
            plan: format!("1. Execute task: {}", task),
            first_agent: fallback_role(&self.valid_agents, self.config.default_agent),
            first_instruction: task.to_string(),
            complexity: String::new(),
            estimated_steps: Some(1),
            thinking: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentReport, PendingStep, normalizer};
    use crate::llm::MockLlmClient;
    use crate::supervisor::parser::UNPARSEABLE_REASON;

    fn supervisor(mock: Arc<MockLlmClient>) -> Supervisor {
        Supervisor::new(mock, SupervisorConfig::default(), AgentRole::ALL.to_vec())
    }

    fn planned_state() -> RunState {
        let mut state = RunState::new("s1", "add input validation to parse_config", "/repo");
        state.plan = "1. code\n2. test".to_string();
        state.iteration = 1;
        state.next_agent = Some(NextAgent::Worker(AgentRole::Developer));
        state.current_instruction = "Add validation".to_string();
        state
    }

    #[tokio::test]
    async fn test_plan_sets_state() {
        let mock = Arc::new(MockLlmClient::with_texts([
            r#"{"plan": ["edit config.py", "run tests"], "first_agent": "developer", "first_instruction": "Validate inputs in parse_config", "complexity": "low", "estimated_steps": 2}"#,
        ]));
        let sup = supervisor(mock.clone());
        let mut state = RunState::new("s1", "add input validation to parse_config", "/repo");

        let record = sup.plan(&mut state, "config.py\n").await;

        assert_eq!(record.first_agent, AgentRole::Developer);
        assert_eq!(state.iteration, 1);
        assert_eq!(state.plan, "1. edit config.py\n2. run tests");
        assert_eq!(state.next_agent, Some(NextAgent::Worker(AgentRole::Developer)));
        assert_eq!(state.current_instruction, "Validate inputs in parse_config");
        assert_eq!(state.routing_history.len(), 1);
        assert_eq!(state.routing_history[0].iteration, 0);
        assert_eq!(state.conversation_log.len(), 1);
        assert_eq!(state.pending_step(12), PendingStep::Dispatch(AgentRole::Developer));

        let request = &mock.requests()[0];
        assert!(request.last_user_text().unwrap().contains("config.py"));
    }

    #[tokio::test]
    async fn test_plan_terminal_first_agent_defaults() {
        let mock = Arc::new(MockLlmClient::with_texts([
            r#"{"plan": "nothing to do", "first_agent": "FINISH", "first_instruction": ""}"#,
        ]));
        let mut state = RunState::new("s1", "tidy up", "/repo");
        let record = supervisor(mock).plan(&mut state, "").await;
        assert_eq!(record.first_agent, AgentRole::Developer);
        assert_eq!(state.current_instruction, "tidy up");
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_completion_failure() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error("connection reset");
        let mut state = RunState::new("s1", "fix the build", "/repo");

        let record = supervisor(mock).plan(&mut state, "").await;

        assert_eq!(record.first_agent, AgentRole::Developer);
        assert_eq!(state.plan, "1. Execute task: fix the build");
        assert_eq!(state.iteration, 1);
    }

    #[tokio::test]
    async fn test_route_to_worker() {
        let mock = Arc::new(MockLlmClient::with_texts([
            r#"```json
{"thinking": "tests next", "next_agent": "qa", "instruction": "Run pytest", "reason": "verify", "plan_update": "1. code\n2. test\n3. review"}
```"#,
        ]));
        let mut state = planned_state();
        normalizer::record(&mut state, AgentRole::Developer, AgentReport::success("done"));

        let decision = supervisor(mock).route(&mut state).await;

        assert_eq!(decision.next_agent, NextAgent::Worker(AgentRole::Qa));
        assert_eq!(state.iteration, 2);
        assert_eq!(state.current_instruction, "Run pytest");
        assert_eq!(state.plan, "1. code\n2. test\n3. review");
        assert_eq!(state.routing_history.last().unwrap().iteration, 1);
        assert_eq!(state.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_unparseable_response_finishes() {
        let mock = Arc::new(MockLlmClient::with_texts(["I think we should run tests next"]));
        let mut state = planned_state();

        let decision = supervisor(mock).route(&mut state).await;

        assert_eq!(decision.next_agent, NextAgent::Finish);
        assert_eq!(decision.reason, UNPARSEABLE_REASON);
        assert_eq!(state.status, RunStatus::Finished);
        assert!(state.ended_with_terminal());
        assert_eq!(state.pending_step(12), PendingStep::Done);
    }

    #[tokio::test]
    async fn test_completion_failure_finishes() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error("timeout");
        let mut state = planned_state();

        let decision = supervisor(mock).route(&mut state).await;

        assert!(decision.next_agent.is_terminal());
        assert!(decision.reason.starts_with("supervisor completion failed"));
        assert_eq!(state.iteration, 2);
    }

    #[tokio::test]
    async fn test_ceiling_overrides_model() {
        let mock = Arc::new(MockLlmClient::with_texts([
            r#"{"next_agent": "developer", "instruction": "keep going", "reason": "more work"}"#,
        ]));
        let mut state = planned_state();
        state.iteration = 12;

        let decision = supervisor(mock).route(&mut state).await;

        assert_eq!(decision.next_agent, NextAgent::Finish);
        assert_eq!(state.iteration, 13);
        assert_eq!(state.status, RunStatus::CeilingReached);
        let last = state.routing_history.last().unwrap();
        assert!(last.agent.is_terminal());
        assert!(last.reason.contains("Iteration limit reached (12/12)"));
    }

    #[tokio::test]
    async fn test_finish_with_untested_changes_goes_to_qa() {
        let mock = Arc::new(MockLlmClient::with_texts([
            r#"{"next_agent": "FINISH", "instruction": "", "reason": "validation added"}"#,
        ]));
        let mut state = planned_state();
        normalizer::record(
            &mut state,
            AgentRole::Developer,
            AgentReport::success("added validation").with_artifact("files_changed", vec!["config.py"]),
        );

        let decision = supervisor(mock).route(&mut state).await;

        assert_eq!(decision.next_agent, NextAgent::Worker(AgentRole::Qa));
        assert!(decision.instruction.contains("config.py"));
        assert_eq!(state.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_qa_gate_leaves_other_workers_alone() {
        let mock = Arc::new(MockLlmClient::with_texts([
            r#"{"next_agent": "reviewer", "instruction": "Review the diff", "reason": "review first"}"#,
        ]));
        let mut state = planned_state();
        normalizer::record(
            &mut state,
            AgentRole::Developer,
            AgentReport::success("added validation").with_artifact("files_changed", vec!["config.py"]),
        );

        let decision = supervisor(mock).route(&mut state).await;

        assert_eq!(decision.next_agent, NextAgent::Worker(AgentRole::Reviewer));
        assert_eq!(state.current_instruction, "Review the diff");
        assert!(state.has_untested_changes());
    }

    #[tokio::test]
    async fn test_ceiling_beats_qa_gate() {
        let mock = Arc::new(MockLlmClient::with_texts([r#"{"next_agent": "FINISH", "reason": "done"}"#]));
        let mut state = planned_state();
        state.iteration = 12;
        normalizer::record(
            &mut state,
            AgentRole::Developer,
            AgentReport::success("changed").with_artifact("files_changed", vec!["config.py"]),
        );

        let decision = supervisor(mock).route(&mut state).await;
        assert!(decision.next_agent.is_terminal());
        assert_eq!(state.status, RunStatus::CeilingReached);
    }

    #[tokio::test]
    async fn test_rejection_changes_instruction() {
        let mock = Arc::new(MockLlmClient::with_texts([
            r#"{"next_agent": "developer", "instruction": "Add validation", "reason": "retry"}"#,
        ]));
        let mut state = planned_state();
        state.human_approval = HumanApproval::Rejected {
            feedback: "do not touch auth.py".to_string(),
        };

        let decision = supervisor(mock.clone()).route(&mut state).await;

        let prompt = mock.requests()[0].last_user_text().unwrap();
        assert!(prompt.contains("do not touch auth.py"));
        assert_ne!(decision.instruction, "Add validation");
        assert!(decision.instruction.contains("do not touch auth.py"));
        assert_eq!(state.human_approval, HumanApproval::Unset);
    }
}
