//! Reviewer role - reads diffs and gives a verdict

use serde_json::json;

use super::profile::RoleProfile;
use super::tool_loop::Transcript;
use crate::domain::{AgentRole, Artifacts, ReportStatus};

const SYSTEM_PROMPT: &str = "You are the code reviewer on a small software team. You review changes; you never \
edit files.

How to work:
- Start from git_status and git_diff (staged and unstaged), then read the surrounding code.
- Check correctness, error handling, security issues and whether the change matches the task.
- Be specific: name the file and line for every problem.
- End your summary with exactly one verdict: APPROVED, CHANGES_REQUESTED or REJECTED.
- Finish by calling submit_report with your review as the summary and the verdict in artifacts.review_verdict.";

const TOOLS: &[&str] = &[
    "read_file",
    "list_directory",
    "repo_tree",
    "glob",
    "grep",
    "git_status",
    "git_diff",
    "git_log",
    "submit_report",
];

/// Review outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    ChangesRequested,
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::ChangesRequested => "CHANGES_REQUESTED",
            Verdict::Rejected => "REJECTED",
        }
    }

    /// Find a verdict in free text; the most severe one mentioned wins
    pub fn find_in(text: &str) -> Option<Self> {
        let upper = text.to_uppercase();
        if upper.contains("CHANGES_REQUESTED") || upper.contains("CHANGES REQUESTED") {
            Some(Verdict::ChangesRequested)
        } else if upper.contains("REJECTED") {
            Some(Verdict::Rejected)
        } else if upper.contains("APPROVED") {
            Some(Verdict::Approved)
        } else {
            None
        }
    }
}

pub struct Reviewer;

impl Reviewer {
    fn verdict(transcript: &Transcript) -> Option<Verdict> {
        let submission = transcript.submitted.as_ref();
        submission
            .and_then(|s| s.artifacts.get("review_verdict"))
            .and_then(|v| v.as_str())
            .and_then(Verdict::find_in)
            .or_else(|| submission.and_then(|s| Verdict::find_in(&s.summary)))
            .or_else(|| Verdict::find_in(&transcript.final_text))
    }
}

impl RoleProfile for Reviewer {
    fn role(&self) -> AgentRole {
        AgentRole::Reviewer
    }

    fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> &'static [&'static str] {
        TOOLS
    }

    fn artifacts(&self, transcript: &Transcript, _written_files: &[String]) -> Artifacts {
        let mut artifacts = Artifacts::new();
        if let Some(verdict) = Self::verdict(transcript) {
            artifacts.insert("review_verdict".to_string(), json!(verdict.as_str()));
        }
        artifacts.insert("review_done".to_string(), json!(!transcript.hit_step_limit));
        artifacts
    }

    fn infer_status(&self, transcript: &Transcript, _artifacts: &Artifacts) -> ReportStatus {
        match Self::verdict(transcript) {
            Some(Verdict::Approved) => ReportStatus::Success,
            Some(_) => ReportStatus::Warning,
            None => transcript.inferred_status(),
        }
    }
}
