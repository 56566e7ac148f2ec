//! Role profiles and the generic tool-using worker built from them

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::tool_loop::{ToolLoop, Transcript};
use super::{Assignment, Worker, WorkerError};
use crate::config::WorkerConfig;
use crate::domain::{AgentReport, AgentRole, Artifacts, ReportStatus, merge_artifacts};
use crate::llm::LlmClient;
use crate::tools::{ToolContext, ToolExecutor};

/// What makes one role different from another
pub trait RoleProfile: Send + Sync {
    fn role(&self) -> AgentRole;

    fn system_prompt(&self) -> &'static str;

    /// Tools this role may call
    fn tools(&self) -> &'static [&'static str];

    /// Artifacts the worker can vouch for from what it actually did
    fn artifacts(&self, transcript: &Transcript, written_files: &[String]) -> Artifacts;

    /// Status when the model did not submit one
    fn infer_status(&self, transcript: &Transcript, _artifacts: &Artifacts) -> ReportStatus {
        transcript.inferred_status()
    }
}

/// A worker that runs a role profile through the shared tool loop
pub struct AgentWorker<P: RoleProfile> {
    profile: P,
    llm: Arc<dyn LlmClient>,
    config: WorkerConfig,
    max_tokens: u32,
}

impl<P: RoleProfile> AgentWorker<P> {
    pub fn new(profile: P, llm: Arc<dyn LlmClient>, config: WorkerConfig) -> Self {
        Self {
            profile,
            llm,
            config,
            max_tokens: 8192,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl<P: RoleProfile> Worker for AgentWorker<P> {
    fn role(&self) -> AgentRole {
        self.profile.role()
    }

    async fn run(&self, assignment: &Assignment) -> Result<AgentReport, WorkerError> {
        let role = self.profile.role();
        if !assignment.repo_path.is_dir() {
            return Err(WorkerError::Setup(format!(
                "repository {} is not a directory",
                assignment.repo_path.display()
            )));
        }

        let ctx = ToolContext::new(assignment.repo_path.clone(), assignment.session_id.clone())
            .with_command_timeout(Duration::from_millis(self.config.command_timeout_ms));
        let executor = ToolExecutor::with_tools(self.profile.tools());

        log::info!(
            "[{}] {} starting: {}",
            assignment.session_id,
            role,
            crate::supervisor::truncate_chars(&assignment.instruction, 120)
        );

        let transcript = ToolLoop::new(self.llm.as_ref(), &executor, self.config.max_steps)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.max_tokens)
            .run(self.profile.system_prompt(), &assignment_prompt(assignment), &ctx)
            .await?;

        let written = ctx.written_files().await;
        let report = build_report(&self.profile, &transcript, &written, self.config.max_steps);

        log::info!(
            "[{}] {} finished with {} after {} steps ({} tool errors)",
            assignment.session_id,
            role,
            report.status,
            transcript.steps,
            transcript.error_count()
        );
        Ok(report)
    }
}

/// Fold a transcript into the report handed back to the driver.
///
/// Submitted artifacts go in first; observed ones win on collision.
fn build_report<P: RoleProfile>(profile: &P, transcript: &Transcript, written: &[String], max_steps: u32) -> AgentReport {
    let mut artifacts = transcript
        .submitted
        .as_ref()
        .map(|s| s.artifacts.clone())
        .unwrap_or_default();
    merge_artifacts(&mut artifacts, profile.artifacts(transcript, written));

    let status = match &transcript.submitted {
        Some(submission) => submission.status,
        None => profile.infer_status(transcript, &artifacts),
    };

    let mut text = match &transcript.submitted {
        Some(submission) if !submission.summary.is_empty() => submission.summary.clone(),
        _ if !transcript.final_text.is_empty() => transcript.final_text.clone(),
        _ => format!("{} finished without a summary", profile.role()),
    };
    if transcript.hit_step_limit {
        text.push_str(&format!(
            "\n\n(step budget of {} exhausted before a report was submitted)",
            max_steps
        ));
    }

    AgentReport {
        text,
        status,
        artifacts,
    }
}

/// First user turn of every worker conversation
pub fn assignment_prompt(assignment: &Assignment) -> String {
    let mut prompt = format!(
        "## Task\n{}\n\n## Your instruction\n{}\n\n## Repository\n{}\n",
        assignment.task,
        assignment.instruction,
        assignment.repo_path.display()
    );

    if !assignment.changed_files.is_empty() {
        prompt.push_str("\n## Files changed so far in this run\n");
        for file in &assignment.changed_files {
            prompt.push_str(&format!("- {}\n", file));
        }
    }

    prompt.push_str(
        "\nWork inside the repository with your tools. Paths are relative to the repository root.\n\
         When you are done, call submit_report exactly once with a summary, a status and any artifacts.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::tool_loop::Submission;
    use serde_json::json;
    use std::path::PathBuf;

    struct Plain;

    impl RoleProfile for Plain {
        fn role(&self) -> AgentRole {
            AgentRole::Docs
        }

        fn system_prompt(&self) -> &'static str {
            "plain"
        }

        fn tools(&self) -> &'static [&'static str] {
            &["read_file", "submit_report"]
        }

        fn artifacts(&self, _transcript: &Transcript, written: &[String]) -> Artifacts {
            let mut artifacts = Artifacts::new();
            artifacts.insert("written".to_string(), json!(written));
            artifacts
        }
    }

    fn assignment() -> Assignment {
        Assignment {
            instruction: "update the README".to_string(),
            repo_path: PathBuf::from("/tmp/repo"),
            task: "document the CLI".to_string(),
            session_id: "s1".to_string(),
            changed_files: vec!["cli.py".to_string()],
        }
    }

    #[test]
    fn test_assignment_prompt() {
        let prompt = assignment_prompt(&assignment());
        assert!(prompt.contains("## Task\ndocument the CLI"));
        assert!(prompt.contains("update the README"));
        assert!(prompt.contains("- cli.py"));
        assert!(prompt.contains("submit_report"));
    }

    #[test]
    fn test_observed_artifacts_win() {
        let transcript = Transcript {
            submitted: Some(Submission {
                summary: "done".to_string(),
                status: ReportStatus::Warning,
                artifacts: [
                    ("written".to_string(), json!(["claimed.md"])),
                    ("extra".to_string(), json!(true)),
                ]
                .into_iter()
                .collect(),
            }),
            ..Default::default()
        };

        let report = build_report(&Plain, &transcript, &["README.md".to_string()], 5);
        assert_eq!(report.text, "done");
        assert_eq!(report.status, ReportStatus::Warning);
        assert_eq!(report.artifacts["written"], json!(["README.md"]));
        assert_eq!(report.artifacts["extra"], json!(true));
    }

    #[test]
    fn test_report_without_submission() {
        let transcript = Transcript {
            steps: 5,
            hit_step_limit: true,
            ..Default::default()
        };

        let report = build_report(&Plain, &transcript, &[], 5);
        assert_eq!(report.status, ReportStatus::Error);
        assert!(report.text.starts_with("docs finished without a summary"));
        assert!(report.text.contains("step budget of 5 exhausted"));
    }
}
