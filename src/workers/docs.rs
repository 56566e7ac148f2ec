//! Docs role - README, changelog and inline documentation

use std::path::Path;

use serde_json::json;

use super::profile::RoleProfile;
use super::tool_loop::Transcript;
use crate::domain::{AgentRole, Artifacts};

const SYSTEM_PROMPT: &str = "You are the technical writer on a small software team. You keep the README, the \
changelog and inline documentation in line with the code.

How to work:
- Read the code you are documenting; never describe behavior you have not seen in the source.
- Update the README for user-facing changes and add a changelog entry when the project keeps one.
- Add or fix docstrings and doc comments in source files where the instruction asks for it. Do not change code.
- Match the tone and format the existing documentation already uses.
- Finish by calling submit_report with the files you updated.";

const TOOLS: &[&str] = &[
    "read_file",
    "write_file",
    "edit_file",
    "list_directory",
    "repo_tree",
    "glob",
    "grep",
    "git_status",
    "git_diff",
    "git_log",
    "submit_report",
];

/// Extensions of files that are documentation in their own right
const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt", "adoc"];

pub struct Docs;

impl RoleProfile for Docs {
    fn role(&self) -> AgentRole {
        AgentRole::Docs
    }

    fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> &'static [&'static str] {
        TOOLS
    }

    fn artifacts(&self, _transcript: &Transcript, written_files: &[String]) -> Artifacts {
        let file_stem = |path: &String| {
            Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_uppercase())
                .unwrap_or_default()
        };
        let is_doc_file = |path: &String| {
            Path::new(path)
                .extension()
                .is_some_and(|ext| DOC_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
        };

        let mut artifacts = Artifacts::new();
        artifacts.insert("docs_files_updated".to_string(), json!(written_files));
        artifacts.insert(
            "readme_updated".to_string(),
            json!(written_files.iter().any(|f| file_stem(f) == "README")),
        );
        artifacts.insert(
            "changelog_updated".to_string(),
            json!(written_files.iter().any(|f| matches!(file_stem(f).as_str(), "CHANGELOG" | "CHANGES" | "HISTORY"))),
        );
        artifacts.insert(
            "docstrings_added".to_string(),
            json!(written_files.iter().any(|f| !is_doc_file(f))),
        );
        artifacts
    }
}
