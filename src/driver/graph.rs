//! Routing graph driver - runs plan, dispatch and route steps until the run stops
//!
//! The driver owns the loop and nothing else: every decision comes from the
//! supervisor and every report from a worker. It checkpoints the state after
//! each step, so the pending step can always be derived from the last
//! snapshot. A run stops on a FINISH decision, on the iteration ceiling, on
//! cancellation or before an interrupted dispatch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;

use super::signal::{NoOpSignalChecker, SignalChecker};
use crate::domain::{AgentReport, AgentRole, HumanApproval, PendingStep, RunState, RunStatus, record};
use crate::error::{ItDeptError, Result};
use crate::store::{Checkpointer, SessionSummary};
use crate::supervisor::Supervisor;
use crate::tools::summarize_repo;
use crate::workers::{Assignment, WorkerRegistry};

/// Depth and size of the repository tree shown to the planner
const PLAN_TREE_DEPTH: usize = 2;
const PLAN_TREE_ENTRIES: usize = 200;

pub struct Driver {
    supervisor: Supervisor,
    workers: WorkerRegistry,
    checkpointer: Arc<dyn Checkpointer>,
    signals: Arc<dyn SignalChecker>,
    interrupt_before: Vec<AgentRole>,
}

impl Driver {
    pub fn new(supervisor: Supervisor, workers: WorkerRegistry, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            supervisor,
            workers,
            checkpointer,
            signals: Arc::new(NoOpSignalChecker),
            interrupt_before: Vec::new(),
        }
    }

    pub fn with_signals(mut self, signals: Arc<dyn SignalChecker>) -> Self {
        self.signals = signals;
        self
    }

    /// Pause before dispatching any of these roles until a human resumes the run
    pub fn with_interrupts(mut self, roles: Vec<AgentRole>) -> Self {
        self.interrupt_before = roles;
        self
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn interrupt_before(&self) -> &[AgentRole] {
        &self.interrupt_before
    }

    /// Start a new run and drive it until it stops
    pub async fn submit(&self, task: &str, repo_path: &Path, session_id: &str) -> Result<RunState> {
        if self.load_snapshot(session_id)?.is_some() {
            return Err(ItDeptError::InvalidState(format!(
                "session {} already exists, resume it instead",
                session_id
            )));
        }

        log::info!("Submitting session {} in {}", session_id, repo_path.display());
        let mut state = RunState::new(session_id, task, repo_path);
        state.log("user", format!("📝 **Task:** {}", task));
        self.checkpoint(&state);

        self.drive(state).await
    }

    /// Continue a stored run.
    ///
    /// A paused run either dispatches the paused worker (approved) or hands the
    /// feedback to the supervisor for a new routing decision (rejected). A
    /// running or cancelled run picks up at its pending step.
    pub async fn resume(&self, session_id: &str, approved: bool, feedback: &str) -> Result<RunState> {
        let mut state = self.load(session_id)?;

        match state.status {
            RunStatus::Finished | RunStatus::CeilingReached => {
                return Err(ItDeptError::InvalidState(format!(
                    "session {} is {} and cannot be resumed",
                    session_id,
                    state.status.as_str()
                )));
            }
            RunStatus::Paused { agent } => {
                state.status = RunStatus::Running;
                if approved {
                    log::info!("Session {} approved dispatch to {}", session_id, agent);
                    state.human_approval = HumanApproval::Approved;
                    let mut entry = format!("✅ **Human approved** dispatch to {}", agent.as_str().to_uppercase());
                    if !feedback.trim().is_empty() {
                        entry.push_str(&format!("\n\n{}", feedback.trim()));
                    }
                    state.log("human", entry);
                } else {
                    log::info!("Session {} rejected dispatch to {}: {}", session_id, agent, feedback);
                    state.human_approval = HumanApproval::Rejected {
                        feedback: feedback.to_string(),
                    };
                    state.log(
                        "human",
                        format!(
                            "❌ **Human rejected** dispatch to {}\n\n{}",
                            agent.as_str().to_uppercase(),
                            feedback
                        ),
                    );
                    if self.cancelled(session_id).await {
                        log::warn!("Session {} cancelled before rerouting the rejected dispatch", session_id);
                        state.status = RunStatus::Cancelled;
                        state.log("system", format!("⏹️ Run cancelled at iteration {}", state.iteration));
                        self.checkpoint(&state);
                        return Ok(state);
                    }
                    // The paused dispatch is dropped; the supervisor routes again with the feedback
                    self.supervisor.route(&mut state).await;
                }
                self.checkpoint(&state);
            }
            RunStatus::Running | RunStatus::Cancelled => {
                log::info!(
                    "Resuming session {} from {} at iteration {}",
                    session_id,
                    state.status.as_str(),
                    state.iteration
                );
                state.status = RunStatus::Running;
                state.log("system", format!("▶️ Resumed at iteration {}", state.iteration));
            }
        }

        self.drive(state).await
    }

    /// Latest snapshot of a session
    pub fn load(&self, session_id: &str) -> Result<RunState> {
        self.load_snapshot(session_id)?
            .ok_or_else(|| ItDeptError::SessionNotFound(session_id.to_string()))
    }

    pub fn sessions(&self) -> Result<Vec<SessionSummary>> {
        self.checkpointer
            .list()
            .map_err(|e| ItDeptError::Storage(format!("{:#}", e)))
    }

    fn load_snapshot(&self, session_id: &str) -> Result<Option<RunState>> {
        self.checkpointer
            .load(session_id)
            .map_err(|e| ItDeptError::Storage(format!("{:#}", e)))
    }

    async fn drive(&self, mut state: RunState) -> Result<RunState> {
        let ceiling = self.supervisor.max_iterations();

        loop {
            let step = state.pending_step(ceiling);
            if step == PendingStep::Done {
                break;
            }

            if self.cancelled(&state.session_id).await {
                log::warn!(
                    "Session {} cancelled at iteration {} before {:?}",
                    state.session_id,
                    state.iteration,
                    step
                );
                state.status = RunStatus::Cancelled;
                state.log("system", format!("⏹️ Run cancelled at iteration {}", state.iteration));
                self.checkpoint(&state);
                return Ok(state);
            }

            match step {
                PendingStep::Plan => {
                    let summary = repo_summary(&state.repo_path).await;
                    self.supervisor.plan(&mut state, &summary).await;
                }
                PendingStep::Dispatch(role) => {
                    if self.interrupt_before.contains(&role) && state.human_approval != HumanApproval::Approved {
                        log::info!(
                            "Session {} paused before {} at iteration {}",
                            state.session_id,
                            role,
                            state.iteration
                        );
                        state.status = RunStatus::Paused { agent: role };
                        state.log(
                            "system",
                            format!(
                                "⏸️ Waiting for approval before {}: {}",
                                role.as_str().to_uppercase(),
                                state.current_instruction
                            ),
                        );
                        self.checkpoint(&state);
                        return Ok(state);
                    }
                    self.dispatch(&mut state, role).await;
                }
                PendingStep::Route => {
                    self.supervisor.route(&mut state).await;
                }
                PendingStep::Done => break,
            }

            state.touch();
            self.checkpoint(&state);
        }

        if !state.status.is_terminal() {
            // Only reachable from a snapshot that went past the ceiling without a FINISH entry
            state.status = if state.ended_with_terminal() {
                RunStatus::Finished
            } else {
                RunStatus::CeilingReached
            };
            self.checkpoint(&state);
        }

        log::info!(
            "Session {} stopped: {} after {} routing decisions",
            state.session_id,
            state.status.as_str(),
            state.routing_history.len()
        );
        Ok(state)
    }

    /// Run one worker and fold its report into the state; worker failures become error reports
    async fn dispatch(&self, state: &mut RunState, role: AgentRole) {
        let report = match self.workers.get(role) {
            None => {
                log::warn!("Session {}: no worker registered for {}", state.session_id, role);
                AgentReport::warning(format!("{} agent not available", role))
            }
            Some(worker) => {
                let assignment = Assignment::from_state(state);
                log::info!(
                    "Session {} iteration {} dispatching {}",
                    state.session_id,
                    state.iteration,
                    role
                );

                match AssertUnwindSafe(worker.run(&assignment)).catch_unwind().await {
                    Ok(Ok(report)) => report,
                    Ok(Err(e)) => {
                        log::error!("Session {}: {} failed: {}", state.session_id, role, e);
                        AgentReport::error(format!("{} agent failed: {}", role, e))
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        log::error!("Session {}: {} panicked: {}", state.session_id, role, message);
                        AgentReport::error(format!("{} agent crashed: {}", role, message))
                    }
                }
            }
        };

        record(state, role, report);
    }

    async fn cancelled(&self, session_id: &str) -> bool {
        match self.signals.should_stop(session_id).await {
            Ok(stop) => stop,
            Err(e) => {
                log::warn!("Signal check failed for {}: {}", session_id, e);
                false
            }
        }
    }

    fn checkpoint(&self, state: &RunState) {
        if let Err(e) = self.checkpointer.save(state) {
            log::error!(
                "Checkpoint failed for {} at iteration {}: {:#}",
                state.session_id,
                state.iteration,
                e
            );
        }
    }
}

async fn repo_summary(repo_path: &Path) -> String {
    let root = repo_path.to_path_buf();
    tokio::task::spawn_blocking(move || summarize_repo(&root, PLAN_TREE_DEPTH, PLAN_TREE_ENTRIES))
        .await
        .unwrap_or_else(|e| {
            log::warn!("Repository summary failed: {}", e);
            "(repository unavailable)".to_string()
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisorConfig;
    use crate::domain::{NextAgent, ReportStatus};
    use crate::driver::CancelSignal;
    use crate::llm::MockLlmClient;
    use crate::store::MemoryCheckpointer;
    use crate::workers::{Worker, WorkerError};
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    struct Scripted {
        role: AgentRole,
        report: AgentReport,
    }

    #[async_trait]
    impl Worker for Scripted {
        fn role(&self) -> AgentRole {
            self.role
        }

        async fn run(&self, _assignment: &Assignment) -> std::result::Result<AgentReport, WorkerError> {
            Ok(self.report.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Worker for Failing {
        fn role(&self) -> AgentRole {
            AgentRole::Devops
        }

        async fn run(&self, _assignment: &Assignment) -> std::result::Result<AgentReport, WorkerError> {
            Err(WorkerError::Setup("docker daemon unreachable".to_string()))
        }
    }

    fn plan_json(agent: &str) -> String {
        json!({"plan": "1. Do it", "first_agent": agent, "first_instruction": "Start"}).to_string()
    }

    fn route_json(agent: &str, instruction: &str) -> String {
        json!({"next_agent": agent, "instruction": instruction, "reason": "next"}).to_string()
    }

    fn driver_with(llm: MockLlmClient, workers: WorkerRegistry) -> (Driver, Arc<MemoryCheckpointer>) {
        let store = Arc::new(MemoryCheckpointer::new());
        let supervisor = Supervisor::new(Arc::new(llm), SupervisorConfig::default(), AgentRole::ALL.to_vec());
        (Driver::new(supervisor, workers, store.clone()), store)
    }

    #[tokio::test]
    async fn test_worker_error_becomes_error_report() {
        let dir = tempdir().unwrap();
        let llm = MockLlmClient::with_texts([plan_json("devops"), route_json("FINISH", "")]);
        let (driver, store) = driver_with(llm, WorkerRegistry::new().with(Arc::new(Failing)));

        let state = driver.submit("set up CI", dir.path(), "s1").await.unwrap();

        assert_eq!(state.agent_outputs.len(), 1);
        assert_eq!(state.agent_outputs[0].status, ReportStatus::Error);
        assert!(state.agent_outputs[0].output.contains("docker daemon unreachable"));
        assert_eq!(state.status, RunStatus::Finished);
        assert_eq!(store.load("s1").unwrap().unwrap(), state);
    }

    #[tokio::test]
    async fn test_missing_worker_reports_warning() {
        let dir = tempdir().unwrap();
        let llm = MockLlmClient::with_texts([plan_json("docs"), route_json("FINISH", "")]);
        let (driver, _store) = driver_with(llm, WorkerRegistry::new());

        let state = driver.submit("write docs", dir.path(), "s1").await.unwrap();

        assert_eq!(state.agent_outputs[0].status, ReportStatus::Warning);
        assert_eq!(state.agent_outputs[0].output, "docs agent not available");
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_step() {
        let dir = tempdir().unwrap();
        let signal = CancelSignal::new();
        signal.cancel();
        let llm = MockLlmClient::with_texts([plan_json("qa")]);
        let (driver, store) = driver_with(llm, WorkerRegistry::new());
        let driver = driver.with_signals(Arc::new(signal.clone()));

        let state = driver.submit("t", dir.path(), "s1").await.unwrap();
        assert_eq!(state.status, RunStatus::Cancelled);
        assert_eq!(state.iteration, 0);
        assert!(state.routing_history.is_empty());

        // Resuming after the signal clears picks up with planning
        signal.reset();
        let worker = Scripted {
            role: AgentRole::Qa,
            report: AgentReport::success("all green"),
        };
        let llm = MockLlmClient::with_texts([plan_json("qa"), route_json("FINISH", "")]);
        let supervisor = Supervisor::new(Arc::new(llm), SupervisorConfig::default(), AgentRole::ALL.to_vec());
        let driver = Driver::new(supervisor, WorkerRegistry::new().with(Arc::new(worker)), store);
        let state = driver.resume("s1", true, "").await.unwrap();
        assert_eq!(state.status, RunStatus::Finished);
        assert_eq!(state.agent_outputs.len(), 1);
    }

    #[tokio::test]
    async fn test_resume_errors() {
        let dir = tempdir().unwrap();
        let llm = MockLlmClient::with_texts([plan_json("qa"), route_json("FINISH", "")]);
        let worker = Scripted {
            role: AgentRole::Qa,
            report: AgentReport::success("ok"),
        };
        let (driver, _store) = driver_with(llm, WorkerRegistry::new().with(Arc::new(worker)));

        assert!(matches!(
            driver.resume("nope", true, "").await,
            Err(ItDeptError::SessionNotFound(_))
        ));

        driver.submit("t", dir.path(), "s1").await.unwrap();
        assert!(matches!(
            driver.resume("s1", true, "").await,
            Err(ItDeptError::InvalidState(_))
        ));
        assert!(matches!(
            driver.submit("t", dir.path(), "s1").await,
            Err(ItDeptError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_approved_resume_dispatches_once() {
        let dir = tempdir().unwrap();
        let llm = MockLlmClient::with_texts([
            plan_json("developer"),
            route_json("developer", "Now add a test"),
        ]);
        let worker = Scripted {
            role: AgentRole::Developer,
            report: AgentReport::success("done"),
        };
        let (driver, _store) = driver_with(llm, WorkerRegistry::new().with(Arc::new(worker)));
        let driver = driver.with_interrupts(vec![AgentRole::Developer]);

        let paused = driver.submit("t", dir.path(), "s1").await.unwrap();
        assert_eq!(
            paused.status,
            RunStatus::Paused {
                agent: AgentRole::Developer
            }
        );
        assert!(paused.agent_outputs.is_empty());

        // One dispatch, one routing call, then a pause before the next developer dispatch
        let paused_again = driver.resume("s1", true, "").await.unwrap();
        assert_eq!(paused_again.agent_outputs.len(), 1);
        assert_eq!(paused_again.next_agent, Some(NextAgent::Worker(AgentRole::Developer)));
        assert_eq!(paused_again.current_instruction, "Now add a test");
        assert_eq!(
            paused_again.status,
            RunStatus::Paused {
                agent: AgentRole::Developer
            }
        );
        assert_eq!(paused_again.human_approval, HumanApproval::Unset);
    }

    #[tokio::test]
    async fn test_rejected_resume_after_cancel_does_not_route() {
        let dir = tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts([
            plan_json("developer"),
            route_json("developer", "Leave auth alone"),
        ]));
        let signal = CancelSignal::new();
        let store = Arc::new(MemoryCheckpointer::new());
        let supervisor = Supervisor::new(llm.clone(), SupervisorConfig::default(), AgentRole::ALL.to_vec());
        let driver = Driver::new(supervisor, WorkerRegistry::new(), store.clone())
            .with_signals(Arc::new(signal.clone()))
            .with_interrupts(vec![AgentRole::Developer]);

        let paused = driver.submit("t", dir.path(), "s1").await.unwrap();
        assert_eq!(paused.routing_history.len(), 1);

        signal.cancel();
        let state = driver.resume("s1", false, "no").await.unwrap();

        assert_eq!(state.status, RunStatus::Cancelled);
        assert_eq!(llm.call_count(), 1);
        assert_eq!(state.routing_history.len(), 1);
        assert_eq!(
            state.human_approval,
            HumanApproval::Rejected {
                feedback: "no".to_string()
            }
        );
        assert_eq!(store.load("s1").unwrap().unwrap(), state);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
