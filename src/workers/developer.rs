//! Developer role - writes and changes code, commits

use serde_json::json;

use super::profile::RoleProfile;
use super::tool_loop::Transcript;
use crate::domain::{AgentRole, Artifacts};

const SYSTEM_PROMPT: &str = "You are the developer on a small software team. You implement features and fix bugs \
in the repository you are given.

How to work:
- Explore before you change anything: repo_tree, list_directory, glob, grep and read_file.
- Make focused changes. Prefer edit_file for existing files (read them first) and write_file for new ones.
- Run the code or a quick check with run_command when it helps, but leave full test runs to QA.
- When the change is complete, stage it with git_add and commit it with git_commit using a short imperative message.
- Finish by calling submit_report with a summary of what changed and why. Use status \"error\" if you could not do it.";

const TOOLS: &[&str] = &[
    "read_file",
    "write_file",
    "edit_file",
    "list_directory",
    "repo_tree",
    "glob",
    "grep",
    "run_command",
    "git_status",
    "git_diff",
    "git_add",
    "git_commit",
    "git_log",
    "submit_report",
];

pub struct Developer;

impl RoleProfile for Developer {
    fn role(&self) -> AgentRole {
        AgentRole::Developer
    }

    fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> &'static [&'static str] {
        TOOLS
    }

    fn artifacts(&self, transcript: &Transcript, written_files: &[String]) -> Artifacts {
        let mut artifacts = Artifacts::new();
        if !written_files.is_empty() {
            artifacts.insert("files_changed".to_string(), json!(written_files));
        }
        artifacts.insert("code_changed".to_string(), json!(!written_files.is_empty()));

        let commit = transcript
            .calls_to("git_commit")
            .rev()
            .find(|inv| !inv.is_error)
            .and_then(|inv| inv.input["message"].as_str());
        if let Some(message) = commit {
            artifacts.insert("commit_message".to_string(), json!(message));
        }
        artifacts
    }
}
